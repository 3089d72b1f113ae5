//! In-memory object store implementing both index and loader.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{DatabaseError, IndexRequest, IndexResult, ObjectLoader, ObjectSource, SpatialIndex};
use crate::object::{FileOffset, MapObject};
use crate::types::TypeSet;

struct Entry<T> {
    object: Arc<T>,
    /// Size level for area queries, 0 for the largest objects.
    level: u32,
}

/// Objects held in memory, keyed by file offset.
///
/// Keeps counters of index queries and batch reads and can be told to fail
/// either, which makes it the backbone of the service tests.
pub struct MemoryStore<T> {
    entries: RwLock<BTreeMap<FileOffset, Entry<T>>>,
    indexed_types: RwLock<TypeSet>,
    queries: AtomicUsize,
    reads: AtomicUsize,
    fail_queries: AtomicBool,
    fail_reads: AtomicBool,
    last_read: Mutex<Vec<FileOffset>>,
}

impl<T: MapObject> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            indexed_types: RwLock::new(TypeSet::new()),
            queries: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            last_read: Mutex::new(Vec::new()),
        }
    }

    /// Adds an object, replacing any object at the same offset.
    pub fn insert(&self, object: T) {
        self.insert_with_level(object, 0);
    }

    /// Adds an object with an area size level.
    pub fn insert_with_level(&self, object: T, level: u32) {
        self.indexed_types.write().insert(object.object_type());
        self.entries.write().insert(
            object.file_offset(),
            Entry {
                object: Arc::new(object),
                level,
            },
        );
    }

    /// Declares types as covered by the index even without objects.
    pub fn index_types(&self, types: &TypeSet) {
        self.indexed_types.write().union_with(types);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of index queries answered so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of batch reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Offsets of the most recent batch read, in the order received.
    pub fn last_read_offsets(&self) -> Vec<FileOffset> {
        self.last_read.lock().clone()
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Wraps this store as an index plus loader pair.
    pub fn source(self: &Arc<Self>) -> ObjectSource<T> {
        ObjectSource::new(self.clone(), self.clone())
    }
}

impl<T: MapObject> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MapObject> SpatialIndex for MemoryStore<T> {
    fn get_offsets(&self, request: &IndexRequest) -> Result<IndexResult, DatabaseError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DatabaseError::Index("injected query failure".to_string()));
        }

        let entries = self.entries.read();
        // Newest offsets first, callers must not rely on index order
        let offsets = entries
            .iter()
            .rev()
            .filter(|(_, entry)| {
                request.types.contains(entry.object.object_type())
                    && request
                        .area_level_limit
                        .map_or(true, |limit| entry.level <= limit)
                    && entry.object.intersects(&request.bbox)
            })
            .map(|(offset, _)| *offset)
            .collect();

        Ok(IndexResult {
            offsets,
            found_types: request.types.intersection(&self.indexed_types.read()),
        })
    }
}

impl<T: MapObject> ObjectLoader<T> for MemoryStore<T> {
    fn load_by_offsets(&self, offsets: &[FileOffset]) -> Result<Vec<Arc<T>>, DatabaseError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        *self.last_read.lock() = offsets.to_vec();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DatabaseError::Read("injected read failure".to_string()));
        }

        let entries = self.entries.read();
        offsets
            .iter()
            .map(|offset| {
                entries
                    .get(offset)
                    .map(|entry| entry.object.clone())
                    .ok_or(DatabaseError::UnknownOffset(*offset))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{GeoBox, GeoCoord, Magnification};
    use crate::object::{Area, Node};
    use crate::types::ObjectTypeId;

    fn node(offset: u64, type_id: u16, lat: f64, lon: f64) -> Node {
        Node {
            offset,
            type_id: ObjectTypeId(type_id),
            coord: GeoCoord::new(lat, lon),
        }
    }

    fn request(types: &[u16], bbox: GeoBox) -> IndexRequest {
        IndexRequest {
            bbox,
            types: types.iter().map(|t| ObjectTypeId(*t)).collect(),
            magnification: Magnification::CITY,
            area_level_limit: None,
        }
    }

    #[test]
    fn test_query_filters_by_type_and_box() {
        let store = MemoryStore::new();
        store.insert(node(1, 1, 0.5, 0.5));
        store.insert(node(2, 2, 0.5, 0.5));
        store.insert(node(3, 1, 5.0, 5.0));

        let result = store
            .get_offsets(&request(&[1, 7], GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0)))
            .unwrap();

        assert_eq!(result.offsets, vec![1]);
        assert_eq!(result.found_types, [ObjectTypeId(1)].into_iter().collect());
        assert_eq!(store.query_count(), 1);
    }

    #[test]
    fn test_area_level_limit() {
        let store = MemoryStore::new();
        let outer = vec![GeoCoord::new(0.0, 0.0), GeoCoord::new(1.0, 1.0)];
        store.insert_with_level(Area::new(1, ObjectTypeId(1), outer.clone()).unwrap(), 3);
        store.insert_with_level(Area::new(2, ObjectTypeId(1), outer).unwrap(), 9);

        let mut req = request(&[1], GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0));
        req.area_level_limit = Some(5);
        assert_eq!(store.get_offsets(&req).unwrap().offsets, vec![1]);

        req.area_level_limit = None;
        assert_eq!(store.get_offsets(&req).unwrap().offsets.len(), 2);
    }

    #[test]
    fn test_load_by_offsets() {
        let store = MemoryStore::new();
        store.insert(node(1, 1, 0.0, 0.0));
        store.insert(node(2, 1, 0.0, 0.0));

        let loaded = store.load_by_offsets(&[1, 2]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.last_read_offsets(), vec![1, 2]);

        assert!(matches!(
            store.load_by_offsets(&[1, 99]),
            Err(DatabaseError::UnknownOffset(99))
        ));
    }

    #[test]
    fn test_failure_injection() {
        let store: MemoryStore<Node> = MemoryStore::new();
        store.set_fail_queries(true);
        store.set_fail_reads(true);

        assert!(store
            .get_offsets(&request(&[1], GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0)))
            .is_err());
        assert!(store.load_by_offsets(&[]).is_err());
        assert_eq!(store.read_count(), 1);
    }
}
