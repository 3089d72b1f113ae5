//! Database access
//!
//! The cache does not know how objects are stored. It talks to a
//! [`Database`] through two narrow interfaces per object kind:
//!
//! - [`SpatialIndex`] resolves a bounding box and a type set into the file
//!   offsets of matching objects
//! - [`ObjectLoader`] loads a batch of objects by file offset
//!
//! Ways and areas may additionally have a pre-simplified low zoom source
//! ([`LowZoomSource`]) covering a subset of types up to a maximum level.
//!
//! [`MemoryStore`] implements both interfaces in memory and [`Dataset`]
//! builds a complete database from a JSON description.

mod dataset;
mod memory;

pub use dataset::{Dataset, DatasetError, DEFAULT_LOW_ZOOM_MAX_LEVEL};
pub use memory::MemoryStore;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::coord::{GeoBox, Magnification};
use crate::object::{Area, FileOffset, Node, Route, Way};
use crate::types::{TypeConfig, TypeSet};

/// Errors reported by index and loader implementations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("index failure: {0}")]
    Index(String),

    #[error("no object at offset {0}")]
    UnknownOffset(FileOffset),

    #[error("read failure: {0}")]
    Read(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Index and loader interfaces
// =============================================================================

/// Parameters of one spatial index query.
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub bbox: GeoBox,
    pub types: TypeSet,
    pub magnification: Magnification,
    /// For area queries, the highest area size level to return.
    pub area_level_limit: Option<u32>,
}

/// Result of a spatial index query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexResult {
    /// Offsets of the matching objects, in no particular order.
    pub offsets: Vec<FileOffset>,
    /// The requested types this index covers, with or without hits.
    pub found_types: TypeSet,
}

/// Resolves a bounding box and type set into object offsets.
pub trait SpatialIndex: Send + Sync {
    fn get_offsets(&self, request: &IndexRequest) -> Result<IndexResult, DatabaseError>;
}

/// Loads objects by file offset.
pub trait ObjectLoader<T>: Send + Sync {
    /// Loads all objects at `offsets`, which are sorted ascending.
    ///
    /// Fails as a whole if any object cannot be read.
    fn load_by_offsets(&self, offsets: &[FileOffset]) -> Result<Vec<Arc<T>>, DatabaseError>;
}

/// An index together with the loader for the objects it points to.
pub struct ObjectSource<T> {
    pub index: Arc<dyn SpatialIndex>,
    pub loader: Arc<dyn ObjectLoader<T>>,
}

impl<T> ObjectSource<T> {
    pub fn new(index: Arc<dyn SpatialIndex>, loader: Arc<dyn ObjectLoader<T>>) -> Self {
        Self { index, loader }
    }
}

impl<T> Clone for ObjectSource<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            loader: self.loader.clone(),
        }
    }
}

/// A pre-simplified source used at low magnifications.
pub struct LowZoomSource<T> {
    pub source: ObjectSource<T>,
    /// Types this source holds optimized data for.
    pub types: TypeSet,
    /// Highest level for which optimized data exists.
    pub max_level: u32,
}

impl<T> LowZoomSource<T> {
    pub fn new(source: ObjectSource<T>, types: TypeSet, max_level: u32) -> Self {
        Self {
            source,
            types,
            max_level,
        }
    }

    /// Returns true if optimized data exists for `magnification`.
    pub fn has_optimizations(&self, magnification: Magnification) -> bool {
        !self.types.is_empty() && magnification.level() <= self.max_level
    }
}

impl<T> Clone for LowZoomSource<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            types: self.types.clone(),
            max_level: self.max_level,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an opened map database.
///
/// Every source is optional. A missing plain source makes loads of that
/// category fail, a missing route or low zoom source merely disables the
/// feature.
pub struct Database {
    type_config: TypeConfig,
    nodes: Option<ObjectSource<Node>>,
    ways: Option<ObjectSource<Way>>,
    areas: Option<ObjectSource<Area>>,
    routes: Option<ObjectSource<Route>>,
    optimized_ways: Option<LowZoomSource<Way>>,
    optimized_areas: Option<LowZoomSource<Area>>,
    open: AtomicBool,
}

impl Database {
    pub fn builder(type_config: TypeConfig) -> DatabaseBuilder {
        DatabaseBuilder {
            database: Database {
                type_config,
                nodes: None,
                ways: None,
                areas: None,
                routes: None,
                optimized_ways: None,
                optimized_areas: None,
                open: AtomicBool::new(true),
            },
        }
    }

    pub fn type_config(&self) -> &TypeConfig {
        &self.type_config
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Closes the database. Subsequent loads fail without touching the sources.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("Database closed");
        }
    }

    pub fn nodes(&self) -> Option<&ObjectSource<Node>> {
        self.nodes.as_ref()
    }

    pub fn ways(&self) -> Option<&ObjectSource<Way>> {
        self.ways.as_ref()
    }

    pub fn areas(&self) -> Option<&ObjectSource<Area>> {
        self.areas.as_ref()
    }

    pub fn routes(&self) -> Option<&ObjectSource<Route>> {
        self.routes.as_ref()
    }

    pub fn optimized_ways(&self) -> Option<&LowZoomSource<Way>> {
        self.optimized_ways.as_ref()
    }

    pub fn optimized_areas(&self) -> Option<&LowZoomSource<Area>> {
        self.optimized_areas.as_ref()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("types", &self.type_config.len())
            .field("nodes", &self.nodes.is_some())
            .field("ways", &self.ways.is_some())
            .field("areas", &self.areas.is_some())
            .field("routes", &self.routes.is_some())
            .field("optimized_ways", &self.optimized_ways.is_some())
            .field("optimized_areas", &self.optimized_areas.is_some())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Builder assembling a [`Database`] from its sources.
pub struct DatabaseBuilder {
    database: Database,
}

impl DatabaseBuilder {
    pub fn with_nodes(mut self, source: ObjectSource<Node>) -> Self {
        self.database.nodes = Some(source);
        self
    }

    pub fn with_ways(mut self, source: ObjectSource<Way>) -> Self {
        self.database.ways = Some(source);
        self
    }

    pub fn with_areas(mut self, source: ObjectSource<Area>) -> Self {
        self.database.areas = Some(source);
        self
    }

    pub fn with_routes(mut self, source: ObjectSource<Route>) -> Self {
        self.database.routes = Some(source);
        self
    }

    pub fn with_optimized_ways(mut self, source: LowZoomSource<Way>) -> Self {
        self.database.optimized_ways = Some(source);
        self
    }

    pub fn with_optimized_areas(mut self, source: LowZoomSource<Area>) -> Self {
        self.database.optimized_areas = Some(source);
        self
    }

    pub fn build(self) -> Database {
        self.database
    }
}
