//! Map tiles
//!
//! A [`Tile`] bundles one [`TileData`] store per object category for a
//! single grid cell. Stores are locked independently, so the category
//! workers can fill the same tile concurrently and completion is tracked
//! per category rather than per tile.

mod data;

pub use data::TileData;

use std::fmt;
use std::sync::Arc;

use crate::coord::{GeoBox, TileId};
use crate::object::{Area, Node, Route, Way};

/// Object category, one per store and one per worker queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Node,
    Way,
    OptimizedWay,
    Area,
    OptimizedArea,
    Route,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Node,
        Category::Way,
        Category::OptimizedWay,
        Category::Area,
        Category::OptimizedArea,
        Category::Route,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Node => "node",
            Category::Way => "way",
            Category::OptimizedWay => "optimized way",
            Category::Area => "area",
            Category::OptimizedArea => "optimized area",
            Category::Route => "route",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All cached data for one grid cell.
pub struct Tile {
    id: TileId,
    bbox: GeoBox,
    nodes: TileData<Node>,
    ways: TileData<Way>,
    optimized_ways: TileData<Way>,
    areas: TileData<Area>,
    optimized_areas: TileData<Area>,
    routes: TileData<Route>,
}

/// Shared handle to a tile; the cache holds one, callers may hold more.
pub type TileRef = Arc<Tile>;

impl Tile {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            bbox: id.bounding_box(),
            nodes: TileData::new(),
            ways: TileData::new(),
            optimized_ways: TileData::new(),
            areas: TileData::new(),
            optimized_areas: TileData::new(),
            routes: TileData::new(),
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn bounding_box(&self) -> GeoBox {
        self.bbox
    }

    pub fn nodes(&self) -> &TileData<Node> {
        &self.nodes
    }

    pub fn ways(&self) -> &TileData<Way> {
        &self.ways
    }

    pub fn optimized_ways(&self) -> &TileData<Way> {
        &self.optimized_ways
    }

    pub fn areas(&self) -> &TileData<Area> {
        &self.areas
    }

    pub fn optimized_areas(&self) -> &TileData<Area> {
        &self.optimized_areas
    }

    pub fn routes(&self) -> &TileData<Route> {
        &self.routes
    }

    /// Returns true if the category has been loaded.
    pub fn is_category_complete(&self, category: Category) -> bool {
        match category {
            Category::Node => self.nodes.is_complete(),
            Category::Way => self.ways.is_complete(),
            Category::OptimizedWay => self.optimized_ways.is_complete(),
            Category::Area => self.areas.is_complete(),
            Category::OptimizedArea => self.optimized_areas.is_complete(),
            Category::Route => self.routes.is_complete(),
        }
    }

    /// Returns true if every category has been loaded.
    ///
    /// Categories complete independently, so this only reflects the moment
    /// of the call.
    pub fn is_complete(&self) -> bool {
        Category::ALL
            .iter()
            .all(|category| self.is_category_complete(*category))
    }

    /// Returns true if no category has recorded any type.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.ways.is_empty()
            && self.optimized_ways.is_empty()
            && self.areas.is_empty()
            && self.optimized_areas.is_empty()
            && self.routes.is_empty()
    }

    /// Marks every category stale, keeping the loaded data.
    pub fn invalidate(&self) {
        self.nodes.invalidate();
        self.ways.invalidate();
        self.optimized_ways.invalidate();
        self.areas.invalidate();
        self.optimized_areas.invalidate();
        self.routes.invalidate();
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .field("ways", &self.ways)
            .field("optimized_ways", &self.optimized_ways)
            .field("areas", &self.areas)
            .field("optimized_areas", &self.optimized_areas)
            .field("routes", &self.routes)
            .finish()
    }
}
