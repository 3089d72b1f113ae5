//! Flattening tiles into render ready object lists.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::object::{AreaRef, FileOffset, MapObject, NodeRef, RouteRef, WayRef};
use crate::style::TypeDefinition;
use crate::tile::{TileData, TileRef};
use crate::types::TypeSet;

/// Merging slower than this is logged.
const SLOW_MERGE: Duration = Duration::from_millis(20);

/// Objects to render, unique by file offset.
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub nodes: Vec<NodeRef>,
    pub ways: Vec<WayRef>,
    pub areas: Vec<AreaRef>,
    pub routes: Vec<RouteRef>,
}

impl MapData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty() && self.areas.is_empty() && self.routes.is_empty()
    }

    /// Total number of objects over all kinds.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.areas.len() + self.routes.len()
    }
}

/// Unique objects of one category, ordered by file offset.
struct UniqueObjects<'a, T> {
    filter: Option<&'a TypeSet>,
    objects: BTreeMap<FileOffset, Arc<T>>,
}

impl<'a, T: MapObject> UniqueObjects<'a, T> {
    fn new(filter: Option<&'a TypeSet>) -> Self {
        Self {
            filter,
            objects: BTreeMap::new(),
        }
    }

    fn collect(&mut self, store: &TileData<T>) {
        let filter = self.filter;
        let objects = &mut self.objects;
        store.copy_data(|object| {
            if filter.map_or(true, |types| types.contains(object.object_type())) {
                objects.insert(object.file_offset(), object.clone());
            }
        });
    }

    fn append_to(self, target: &mut Vec<Arc<T>>) {
        target.extend(self.objects.into_values());
    }
}

fn merge(tiles: &[TileRef], filter: Option<&TypeDefinition>, data: &mut MapData) {
    let started = Instant::now();

    let mut nodes = UniqueObjects::new(filter.map(|f| &f.node_types));
    let mut ways = UniqueObjects::new(filter.map(|f| &f.way_types));
    let mut optimized_ways = UniqueObjects::new(filter.map(|f| &f.optimized_way_types));
    let mut areas = UniqueObjects::new(filter.map(|f| &f.area_types));
    let mut optimized_areas = UniqueObjects::new(filter.map(|f| &f.optimized_area_types));
    let mut routes = UniqueObjects::new(filter.map(|f| &f.route_types));

    for tile in tiles {
        nodes.collect(tile.nodes());
        optimized_ways.collect(tile.optimized_ways());
        ways.collect(tile.ways());
        optimized_areas.collect(tile.optimized_areas());
        areas.collect(tile.areas());
        routes.collect(tile.routes());
    }

    nodes.append_to(&mut data.nodes);
    ways.append_to(&mut data.ways);
    optimized_ways.append_to(&mut data.ways);
    areas.append_to(&mut data.areas);
    optimized_areas.append_to(&mut data.areas);
    routes.append_to(&mut data.routes);

    let elapsed = started.elapsed();
    if elapsed > SLOW_MERGE {
        warn!(
            tiles = tiles.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Copying data from tiles to map data was slow"
        );
    }
}

/// Appends the prefill and loaded data of all `tiles` to `data`.
///
/// Objects present in several tiles are added once. Each kind is ordered by
/// file offset, optimized ways and areas follow the plain ones.
pub fn add_tile_data_to_map_data(tiles: &[TileRef], data: &mut MapData) {
    merge(tiles, None, data);
}

/// Like [`add_tile_data_to_map_data`], but only takes objects whose type is
/// in the matching set of `types`.
pub fn add_tile_data_to_map_data_filtered(
    tiles: &[TileRef],
    types: &TypeDefinition,
    data: &mut MapData,
) {
    merge(tiles, Some(types), data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{GeoCoord, TileId};
    use crate::object::{Node, Way};
    use crate::tile::Tile;
    use crate::types::ObjectTypeId;

    fn node(offset: u64, type_id: u16) -> NodeRef {
        Arc::new(Node {
            offset,
            type_id: ObjectTypeId(type_id),
            coord: GeoCoord::new(0.0, 0.0),
        })
    }

    fn way(offset: u64, type_id: u16) -> WayRef {
        Arc::new(Way::new(offset, ObjectTypeId(type_id), vec![GeoCoord::new(0.0, 0.0)]).unwrap())
    }

    fn set(ids: &[u16]) -> TypeSet {
        ids.iter().map(|id| ObjectTypeId(*id)).collect()
    }

    #[test]
    fn test_merge_deduplicates_by_offset() {
        let a = Arc::new(Tile::new(TileId::new(4, 0, 0)));
        let b = Arc::new(Tile::new(TileId::new(4, 1, 0)));
        a.nodes().set_data(&set(&[1]), vec![node(30, 1), node(10, 1)]);
        b.nodes().set_data(&set(&[1]), vec![node(10, 1), node(20, 1)]);
        b.nodes().add_prefill_data(&set(&[1]), vec![node(30, 1)]);

        let mut data = MapData::new();
        add_tile_data_to_map_data(&[a, b], &mut data);

        let offsets: Vec<u64> = data.nodes.iter().map(|n| n.offset).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_optimized_ways_follow_plain_ways() {
        let tile = Arc::new(Tile::new(TileId::new(4, 0, 0)));
        tile.ways().set_data(&set(&[1]), vec![way(50, 1)]);
        tile.optimized_ways().set_data(&set(&[2]), vec![way(5, 2)]);

        let mut data = MapData::new();
        add_tile_data_to_map_data(&[tile], &mut data);

        let offsets: Vec<u64> = data.ways.iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![50, 5]);
    }

    #[test]
    fn test_filtered_merge() {
        let tile = Arc::new(Tile::new(TileId::new(4, 0, 0)));
        tile.nodes().set_data(&set(&[1, 2]), vec![node(1, 1), node(2, 2)]);
        tile.ways().set_data(&set(&[3]), vec![way(3, 3)]);

        let types = TypeDefinition {
            node_types: set(&[2]),
            ..TypeDefinition::default()
        };
        let mut data = MapData::new();
        add_tile_data_to_map_data_filtered(&[tile], &types, &mut data);

        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].offset, 2);
        assert!(data.ways.is_empty());
    }

    #[test]
    fn test_merge_appends_to_existing_data() {
        let tile = Arc::new(Tile::new(TileId::new(4, 0, 0)));
        tile.nodes().set_data(&set(&[1]), vec![node(1, 1)]);

        let mut data = MapData::new();
        data.nodes.push(node(99, 1));
        add_tile_data_to_map_data(&[tile], &mut data);

        assert_eq!(data.nodes.len(), 2);
    }
}
