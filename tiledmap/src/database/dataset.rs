//! JSON dataset describing a complete in-memory database.
//!
//! ```json
//! {
//!   "types": [{ "name": "highway", "optimize_low_zoom": true }],
//!   "low_zoom_max_level": 10,
//!   "style": [{ "type": "highway", "kind": "way", "min_level": 4 }],
//!   "nodes": [{ "offset": 1, "type": "poi", "coord": { "lat": 1.0, "lon": 2.0 } }],
//!   "ways": [{ "offset": 2, "type": "highway", "nodes": [{ "lat": 1.0, "lon": 2.0 }] }],
//!   "areas": [{ "offset": 3, "type": "forest", "outer": [], "level": 2 }],
//!   "routes": [{ "offset": 4, "type": "bus", "members": [2] }]
//! }
//! ```
//!
//! Ways and areas of types flagged `optimize_low_zoom` are additionally
//! placed in low zoom sources valid up to `low_zoom_max_level`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::{Database, LowZoomSource, MemoryStore};
use crate::coord::{GeoBox, GeoCoord};
use crate::object::{Area, FileOffset, Node, Route, Way};
use crate::style::{ObjectKind, StyleRule, StyleSheet};
use crate::types::{ObjectTypeId, TypeConfig, TypeSet};

/// Default highest level served by the low zoom sources.
pub const DEFAULT_LOW_ZOOM_MAX_LEVEL: u32 = 10;

/// Errors loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown type '{name}' referenced by object {offset}")]
    UnknownType { name: String, offset: FileOffset },

    #[error("unknown type '{0}' referenced by style")]
    UnknownStyleType(String),

    #[error("object {0} has no geometry")]
    EmptyGeometry(FileOffset),
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    name: String,
    #[serde(default)]
    optimize_low_zoom: bool,
}

#[derive(Debug, Deserialize)]
struct StyleEntry {
    #[serde(rename = "type")]
    type_name: String,
    kind: ObjectKind,
    #[serde(default)]
    min_level: u32,
    #[serde(default)]
    max_level: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    offset: FileOffset,
    #[serde(rename = "type")]
    type_name: String,
    coord: GeoCoord,
}

#[derive(Debug, Deserialize)]
struct WayEntry {
    offset: FileOffset,
    #[serde(rename = "type")]
    type_name: String,
    nodes: Vec<GeoCoord>,
}

#[derive(Debug, Deserialize)]
struct AreaEntry {
    offset: FileOffset,
    #[serde(rename = "type")]
    type_name: String,
    outer: Vec<GeoCoord>,
    #[serde(default)]
    level: u32,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    offset: FileOffset,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    members: Vec<FileOffset>,
    #[serde(default)]
    bbox: Option<GeoBox>,
}

fn default_low_zoom_max_level() -> u32 {
    DEFAULT_LOW_ZOOM_MAX_LEVEL
}

/// Description of a map database and its style.
#[derive(Debug, Deserialize)]
pub struct Dataset {
    types: Vec<TypeEntry>,
    #[serde(default = "default_low_zoom_max_level")]
    low_zoom_max_level: u32,
    #[serde(default)]
    style: Vec<StyleEntry>,
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    ways: Vec<WayEntry>,
    #[serde(default)]
    areas: Vec<AreaEntry>,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

impl Dataset {
    /// Reads a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let reader = BufReader::new(File::open(path)?);
        let dataset: Dataset = serde_json::from_reader(reader)?;
        info!(path = %path.display(), "Loaded dataset");
        Ok(dataset)
    }

    /// Parses a dataset from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the database and the style sheet described by this dataset.
    pub fn into_database(self) -> Result<(Database, StyleSheet), DatasetError> {
        let mut config = TypeConfig::new();
        for entry in &self.types {
            config.register(entry.name.as_str(), entry.optimize_low_zoom);
        }
        let low_zoom = config.low_zoom_types();
        let all_types: TypeSet = config.types().iter().map(|info| info.id).collect();

        let lookup = |name: &str, offset: FileOffset| -> Result<ObjectTypeId, DatasetError> {
            config
                .type_by_name(name)
                .ok_or_else(|| DatasetError::UnknownType {
                    name: name.to_string(),
                    offset,
                })
        };

        let mut style = StyleSheet::new();
        for entry in self.style {
            let type_id = config
                .type_by_name(&entry.type_name)
                .ok_or_else(|| DatasetError::UnknownStyleType(entry.type_name.clone()))?;
            style.add_rule(StyleRule {
                type_id,
                kind: entry.kind,
                min_level: entry.min_level,
                max_level: entry.max_level,
            });
        }

        let nodes = Arc::new(MemoryStore::new());
        nodes.index_types(&all_types);
        for entry in self.nodes {
            nodes.insert(Node {
                offset: entry.offset,
                type_id: lookup(&entry.type_name, entry.offset)?,
                coord: entry.coord,
            });
        }

        let ways = Arc::new(MemoryStore::new());
        let optimized_ways = Arc::new(MemoryStore::new());
        ways.index_types(&all_types);
        optimized_ways.index_types(&low_zoom);
        let mut way_boxes = HashMap::new();
        for entry in self.ways {
            let type_id = lookup(&entry.type_name, entry.offset)?;
            let way = Way::new(entry.offset, type_id, entry.nodes)
                .ok_or(DatasetError::EmptyGeometry(entry.offset))?;
            way_boxes.insert(way.offset, way.bbox);
            if low_zoom.contains(type_id) {
                optimized_ways.insert(way.clone());
            }
            ways.insert(way);
        }

        let areas = Arc::new(MemoryStore::new());
        let optimized_areas = Arc::new(MemoryStore::new());
        areas.index_types(&all_types);
        optimized_areas.index_types(&low_zoom);
        for entry in self.areas {
            let type_id = lookup(&entry.type_name, entry.offset)?;
            let area = Area::new(entry.offset, type_id, entry.outer)
                .ok_or(DatasetError::EmptyGeometry(entry.offset))?;
            if low_zoom.contains(type_id) {
                optimized_areas.insert_with_level(area.clone(), entry.level);
            }
            areas.insert_with_level(area, entry.level);
        }

        let routes = Arc::new(MemoryStore::new());
        routes.index_types(&all_types);
        for entry in self.routes {
            let type_id = lookup(&entry.type_name, entry.offset)?;
            let bbox = match entry.bbox {
                Some(bbox) => bbox,
                None => {
                    let mut members = entry.members.iter().filter_map(|m| way_boxes.get(m));
                    let mut bbox = *members
                        .next()
                        .ok_or(DatasetError::EmptyGeometry(entry.offset))?;
                    for member in members {
                        bbox.include_box(member);
                    }
                    bbox
                }
            };
            routes.insert(Route {
                offset: entry.offset,
                type_id,
                bbox,
                member_offsets: entry.members,
                members: Vec::new(),
            });
        }

        let database = Database::builder(config)
            .with_nodes(nodes.source())
            .with_ways(ways.source())
            .with_areas(areas.source())
            .with_routes(routes.source())
            .with_optimized_ways(LowZoomSource::new(
                optimized_ways.source(),
                low_zoom.clone(),
                self.low_zoom_max_level,
            ))
            .with_optimized_areas(LowZoomSource::new(
                optimized_areas.source(),
                low_zoom,
                self.low_zoom_max_level,
            ))
            .build();

        Ok((database, style))
    }
}
