//! TiledMap - tile based spatial cache for map rendering
//!
//! This library loads the vector objects (nodes, ways, areas, routes) a map
//! renderer needs for a viewport and keeps them in a bounded cache of grid
//! tiles, so panning and zooming reuse what was loaded before.
//!
//! # Overview
//!
//! - [`coord`] maps coordinates to [`TileId`]s on a per-level grid
//! - [`tile`] holds the per-category stores of one tile
//! - [`cache`] is the LRU [`TileCache`] with parent tile prefill
//! - [`database`] defines the index and loader interfaces the service reads from
//! - [`service`] is the [`MapService`] orchestrating concurrent loads
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tiledmap::config::MapServiceConfig;
//! use tiledmap::coord::{GeoBox, Magnification};
//! use tiledmap::database::Dataset;
//! use tiledmap::service::{MapData, MapService};
//!
//! let dataset = Dataset::load(Path::new("city.json")).unwrap();
//! let (database, style) = dataset.into_database().unwrap();
//! let service = MapService::new(Arc::new(database), &MapServiceConfig::default()).unwrap();
//!
//! let magnification = Magnification::from_level(12);
//! let bbox = GeoBox::from_bounds(50.0, 8.0, 50.2, 8.3);
//! let tiles = service.lookup_tiles(magnification, &bbox);
//! service.load_missing_tile_data(&service.default_parameter(), &style, &tiles);
//!
//! let mut data = MapData::new();
//! service.add_tile_data_to_map_data(&tiles, &mut data);
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod database;
pub mod error;
pub mod logging;
pub mod object;
pub mod service;
pub mod style;
pub mod tile;
pub mod types;

pub use cache::TileCache;
pub use config::MapServiceConfig;
pub use coord::{GeoBox, GeoCoord, Magnification, TileId};
pub use error::{LoadError, ServiceError};
pub use service::{AreaSearchParameter, MapData, MapService};
pub use tile::{Tile, TileRef};
