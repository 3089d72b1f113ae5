//! Tile cache
//!
//! Least recently used cache of [`Tile`]s keyed by [`TileId`]. The size
//! limit is soft: eviction only drops tiles that nobody outside the cache
//! still holds, so a cache whose tiles are all in use may temporarily grow
//! beyond its limit.
//!
//! # Locking
//!
//! The index and the recency order sit behind a single lock that is only
//! held for lookups, inserts, recency updates and the eviction scan. Tile
//! contents are guarded by the per-category locks inside [`Tile`], so
//! filling a tile never touches the cache lock.

mod prefill;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::coord::{tiles_covering, GeoBox, Magnification, TileId};
use crate::style::TypeDefinition;
use crate::tile::{Tile, TileRef};

/// Default number of tiles kept in the cache.
pub const DEFAULT_CACHE_SIZE: usize = 25;

struct CacheState {
    size: usize,
    /// Monotonic use counter; higher means more recently used.
    tick: u64,
    index: HashMap<TileId, u64>,
    /// Entries ordered from least to most recently used.
    entries: BTreeMap<u64, (TileId, TileRef)>,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Moves an existing entry to the most recently used position.
    fn touch(&mut self, id: &TileId) -> Option<TileRef> {
        let old_tick = *self.index.get(id)?;
        let entry = self.entries.remove(&old_tick)?;
        let tile = entry.1.clone();
        let tick = self.next_tick();
        self.entries.insert(tick, entry);
        self.index.insert(*id, tick);
        Some(tile)
    }

    fn cleanup(&mut self) -> usize {
        if self.entries.len() <= self.size {
            return 0;
        }

        let mut evict = Vec::new();
        let mut remaining = self.entries.len();
        for (tick, (_, tile)) in self.entries.iter() {
            if remaining <= self.size {
                break;
            }
            // Only the cache holds a reference
            if Arc::strong_count(tile) == 1 {
                evict.push(*tick);
                remaining -= 1;
            }
        }

        for tick in &evict {
            if let Some((id, _)) = self.entries.remove(tick) {
                self.index.remove(&id);
                trace!(tile = %id, "Evicted tile from cache");
            }
        }
        evict.len()
    }
}

/// LRU cache of shared tiles.
pub struct TileCache {
    state: Mutex<CacheState>,
}

impl TileCache {
    /// Creates a cache holding up to `size` tiles.
    pub fn new(size: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                size,
                tick: 0,
                index: HashMap::new(),
                entries: BTreeMap::new(),
            }),
        }
    }

    /// The configured size limit.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Changes the size limit, evicting immediately if it shrank.
    pub fn set_size(&self, size: usize) {
        let mut state = self.state.lock();
        let shrink = size < state.size;
        state.size = size;
        if shrink {
            state.cleanup();
        }
    }

    /// Number of tiles currently held.
    pub fn current_size(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Evicts least recently used tiles until the size limit is met again.
    ///
    /// Tiles still referenced outside the cache are skipped, so the cache
    /// may stay above its limit.
    ///
    /// # Returns
    ///
    /// The number of evicted tiles.
    pub fn cleanup(&self) -> usize {
        let evicted = self.state.lock().cleanup();
        if evicted > 0 {
            debug!(evicted, "Cleaned up tile cache");
        }
        evicted
    }

    /// Marks every cached tile stale, keeping its data for prefill.
    pub fn invalidate(&self) {
        let tiles: Vec<TileRef> = {
            let state = self.state.lock();
            state.entries.values().map(|(_, tile)| tile.clone()).collect()
        };
        for tile in &tiles {
            tile.invalidate();
        }
        debug!(tiles = tiles.len(), "Invalidated tile cache");
    }

    /// Evicts every tile not referenced outside the cache.
    pub fn flush(&self) -> usize {
        let mut state = self.state.lock();
        let size = state.size;
        state.size = 0;
        let evicted = state.cleanup();
        state.size = size;
        evicted
    }

    /// Returns the tile for `id`, creating an empty one on a miss.
    ///
    /// The lookup and the insert happen under one lock, so concurrent callers
    /// asking for the same uncached id all receive the same tile.
    pub fn get_tile(&self, id: TileId) -> TileRef {
        let mut state = self.state.lock();
        if let Some(tile) = state.touch(&id) {
            return tile;
        }

        let tile = Arc::new(Tile::new(id));
        let tick = state.next_tick();
        state.entries.insert(tick, (id, tile.clone()));
        state.index.insert(id, tick);
        tile
    }

    /// Returns the tile for `id` if it is cached.
    pub fn get_cached_tile(&self, id: TileId) -> Option<TileRef> {
        self.state.lock().touch(&id)
    }

    /// Returns true if `id` is cached, without changing its recency.
    pub fn contains(&self, id: TileId) -> bool {
        self.state.lock().index.contains_key(&id)
    }

    /// Ids of all cached tiles, most recently used first.
    pub fn cached_ids(&self) -> Vec<TileId> {
        let state = self.state.lock();
        state.entries.values().rev().map(|(id, _)| *id).collect()
    }

    /// Returns the tiles covering `bbox` at `magnification`, creating missing
    /// ones. The result is row-major.
    pub fn tiles_for_bounding_box(
        &self,
        magnification: Magnification,
        bbox: &GeoBox,
    ) -> Vec<TileRef> {
        tiles_covering(magnification, bbox)
            .into_iter()
            .map(|id| self.get_tile(id))
            .collect()
    }

    /// Fills `tile` with matching data of its cached parent.
    ///
    /// For each category, types requested by `types` but not yet recorded in
    /// the tile are copied from the parent if the parent has them, keeping
    /// only objects touching the tile's bounding box. The data goes into the
    /// prefill buffer and never completes a category. Does nothing for level
    /// 0 tiles or if the parent is not cached.
    ///
    /// # Returns
    ///
    /// `true` if any object was copied into the tile.
    pub fn prefill_data_from_cache(&self, tile: &Tile, types: &TypeDefinition) -> bool {
        let Some(parent_id) = tile.id().parent() else {
            return false;
        };
        let Some(parent) = self.get_cached_tile(parent_id) else {
            return false;
        };

        let bbox = tile.bounding_box();
        // Non short-circuiting so every category gets its share
        prefill::resolve_from_parent(tile.nodes(), parent.nodes(), &bbox, &types.node_types)
            | prefill::resolve_from_parent(
                tile.optimized_ways(),
                parent.optimized_ways(),
                &bbox,
                &types.optimized_way_types,
            )
            | prefill::resolve_from_parent(tile.ways(), parent.ways(), &bbox, &types.way_types)
            | prefill::resolve_from_parent(
                tile.optimized_areas(),
                parent.optimized_areas(),
                &bbox,
                &types.optimized_area_types,
            )
            | prefill::resolve_from_parent(tile.areas(), parent.areas(), &bbox, &types.area_types)
            | prefill::resolve_from_parent(
                tile.routes(),
                parent.routes(),
                &bbox,
                &types.route_types,
            )
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoCoord;
    use crate::object::Node;
    use crate::types::{ObjectTypeId, TypeSet};

    fn id(x: u32) -> TileId {
        TileId::new(10, x, 0)
    }

    #[test]
    fn test_get_tile_creates_once() {
        let cache = TileCache::new(10);
        let a = cache.get_tile(id(1));
        let b = cache.get_tile(id(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.current_size(), 1);
    }

    #[test]
    fn test_get_cached_tile_does_not_create() {
        let cache = TileCache::new(10);
        assert!(cache.get_cached_tile(id(1)).is_none());
        assert_eq!(cache.current_size(), 0);

        let tile = cache.get_tile(id(1));
        let cached = cache.get_cached_tile(id(1)).unwrap();
        assert!(Arc::ptr_eq(&tile, &cached));
    }

    #[test]
    fn test_lru_order() {
        let cache = TileCache::new(2);
        cache.get_tile(id(1));
        cache.get_tile(id(2));
        cache.get_tile(id(3));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.cached_ids(), vec![id(3), id(2)]);
    }

    #[test]
    fn test_access_refreshes_recency() {
        let cache = TileCache::new(2);
        cache.get_tile(id(1));
        cache.get_tile(id(2));
        cache.get_cached_tile(id(1));
        cache.get_tile(id(3));

        cache.cleanup();
        assert_eq!(cache.cached_ids(), vec![id(3), id(1)]);
    }

    #[test]
    fn test_cleanup_skips_referenced_tiles() {
        let cache = TileCache::new(1);
        let first = cache.get_tile(id(1));
        let second = cache.get_tile(id(2));
        cache.get_tile(id(3));

        cache.cleanup();
        assert!(cache.contains(id(1)));
        assert!(cache.contains(id(2)));
        assert!(!cache.contains(id(3)));
        assert_eq!(cache.current_size(), 2, "overbooked while tiles are held");

        drop(first);
        cache.cleanup();
        assert_eq!(cache.cached_ids(), vec![second.id()]);
    }

    #[test]
    fn test_set_size_shrinks_immediately() {
        let cache = TileCache::new(5);
        for x in 0..5 {
            cache.get_tile(id(x));
        }
        cache.set_size(2);
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.cached_ids(), vec![id(4), id(3)]);

        cache.set_size(10);
        assert_eq!(cache.current_size(), 2);
    }

    #[test]
    fn test_flush_keeps_held_tiles_and_limit() {
        let cache = TileCache::new(5);
        let held = cache.get_tile(id(1));
        cache.get_tile(id(2));

        assert_eq!(cache.flush(), 1);
        assert_eq!(cache.cached_ids(), vec![held.id()]);
        assert_eq!(cache.size(), 5);
    }

    #[test]
    fn test_invalidate_resets_completion() {
        let cache = TileCache::new(5);
        let tile = cache.get_tile(id(1));
        tile.nodes().set_data(&TypeSet::new(), Vec::new());
        assert!(tile.nodes().is_complete());

        cache.invalidate();
        assert!(!tile.nodes().is_complete());
    }

    #[test]
    fn test_prefill_from_parent() {
        let cache = TileCache::new(10);
        let child_id = TileId::new(6, 13, 41);
        let parent = cache.get_tile(child_id.parent().unwrap());
        let child_box = child_id.bounding_box();
        let parent_box = parent.bounding_box();

        let type_x = ObjectTypeId(1);
        let type_y = ObjectTypeId(2);
        let inside = Arc::new(Node {
            offset: 1,
            type_id: type_x,
            coord: GeoCoord::new(
                (child_box.min.lat + child_box.max.lat) / 2.0,
                (child_box.min.lon + child_box.max.lon) / 2.0,
            ),
        });
        let outside = Arc::new(Node {
            offset: 2,
            type_id: type_x,
            coord: if child_box.max.lat < parent_box.max.lat {
                GeoCoord::new(parent_box.max.lat - 1e-6, child_box.min.lon)
            } else {
                GeoCoord::new(parent_box.min.lat + 1e-6, child_box.min.lon)
            },
        });
        let other_type = Arc::new(Node {
            offset: 3,
            type_id: type_y,
            coord: inside.coord,
        });
        let parent_types: TypeSet = [type_x, type_y].into_iter().collect();
        parent
            .nodes()
            .set_data(&parent_types, vec![inside.clone(), outside, other_type]);

        let child = cache.get_tile(child_id);
        let requested = TypeDefinition {
            node_types: [type_x].into_iter().collect(),
            ..TypeDefinition::default()
        };
        assert!(cache.prefill_data_from_cache(&child, &requested));
        // Already recorded types are not copied twice
        assert!(!cache.prefill_data_from_cache(&child, &requested));

        let nodes = child.nodes().snapshot();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].offset, inside.offset);
        assert_eq!(child.nodes().types(), requested.node_types);
        assert!(!child.nodes().is_complete());
        assert!(child.ways().is_empty());
    }

    #[test]
    fn test_prefill_without_parent_does_nothing() {
        let cache = TileCache::new(10);
        let child = cache.get_tile(TileId::new(6, 13, 41));
        let requested = TypeDefinition {
            node_types: [ObjectTypeId(1)].into_iter().collect(),
            ..TypeDefinition::default()
        };
        assert!(!cache.prefill_data_from_cache(&child, &requested));
        assert!(child.is_empty());

        let root = cache.get_tile(TileId::new(0, 0, 0));
        assert!(!cache.prefill_data_from_cache(&root, &requested));
        assert!(root.is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cleanup_never_evicts_held_tiles(
                size in 0usize..6,
                count in 1u32..20,
                held_mask in prop::collection::vec(any::<bool>(), 20),
            ) {
                let cache = TileCache::new(size);
                let mut held = Vec::new();
                for x in 0..count {
                    let tile = cache.get_tile(id(x));
                    if held_mask[x as usize] {
                        held.push(tile);
                    }
                }

                cache.cleanup();

                for tile in &held {
                    prop_assert!(cache.contains(tile.id()));
                }
                prop_assert!(cache.current_size() <= size.max(held.len()));
            }
        }
    }
}
