//! Per-category object storage for one tile.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::TypeSet;

struct TileDataInner<T> {
    types: TypeSet,
    prefill_data: Vec<Arc<T>>,
    data: Vec<Arc<T>>,
    complete: bool,
}

/// Thread safe container for the objects of one category in one tile.
///
/// Holds two buffers: `prefill_data`, approximated from already cached
/// tiles, and `data`, filled by loads from the database. The recorded type
/// set covers both, so a load only has to ask for what is still missing.
///
/// Every instance carries its own lock, letting the category workers update
/// different categories of the same tile without contending.
pub struct TileData<T> {
    inner: Mutex<TileDataInner<T>>,
}

impl<T> TileData<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TileDataInner {
                types: TypeSet::new(),
                prefill_data: Vec::new(),
                data: Vec::new(),
                complete: false,
            }),
        }
    }

    /// Marks the data as stale so that the next load checks it again.
    ///
    /// Loaded objects and types are kept.
    pub fn invalidate(&self) {
        self.inner.lock().complete = false;
    }

    /// Adds data derived from other tiles without completing the category.
    pub fn add_prefill_data(&self, types: &TypeSet, data: Vec<Arc<T>>) {
        let mut inner = self.inner.lock();
        inner.types.union_with(types);
        if inner.prefill_data.is_empty() {
            inner.prefill_data = data;
        } else {
            inner.prefill_data.extend(data);
        }
    }

    /// Replaces the authoritative data and marks the category complete.
    pub fn set_data(&self, types: &TypeSet, data: Vec<Arc<T>>) {
        let mut inner = self.inner.lock();
        inner.data = data;
        inner.types.union_with(types);
        inner.complete = true;
    }

    /// Appends authoritative data and marks the category complete.
    pub fn add_data(&self, types: &TypeSet, data: Vec<Arc<T>>) {
        let mut inner = self.inner.lock();
        inner.data.extend(data);
        inner.types.union_with(types);
        inner.complete = true;
    }

    /// Marks the category complete without touching its data.
    pub fn set_complete(&self) {
        self.inner.lock().complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().complete
    }

    /// Returns true if no types have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().types.is_empty()
    }

    /// Types covered by the stored data.
    pub fn types(&self) -> TypeSet {
        self.inner.lock().types.clone()
    }

    /// Number of stored objects, prefill and authoritative together.
    pub fn data_len(&self) -> usize {
        let inner = self.inner.lock();
        inner.prefill_data.len() + inner.data.len()
    }

    /// Visits prefill data followed by authoritative data while holding the lock.
    pub fn copy_data<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<T>),
    {
        let inner = self.inner.lock();
        inner.prefill_data.iter().for_each(&mut visit);
        inner.data.iter().for_each(&mut visit);
    }

    /// Clones out every stored object reference.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let inner = self.inner.lock();
        let mut result = Vec::with_capacity(inner.prefill_data.len() + inner.data.len());
        result.extend(inner.prefill_data.iter().cloned());
        result.extend(inner.data.iter().cloned());
        result
    }
}

impl<T> Default for TileData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TileData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TileData")
            .field("types", &inner.types)
            .field("prefill", &inner.prefill_data.len())
            .field("data", &inner.data.len())
            .field("complete", &inner.complete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectTypeId;

    fn types(ids: &[u16]) -> TypeSet {
        ids.iter().map(|id| ObjectTypeId(*id)).collect()
    }

    #[test]
    fn test_new_store_is_empty_and_incomplete() {
        let store: TileData<u32> = TileData::new();
        assert!(store.is_empty());
        assert!(!store.is_complete());
        assert_eq!(store.data_len(), 0);
    }

    #[test]
    fn test_prefill_does_not_complete() {
        let store = TileData::new();
        store.add_prefill_data(&types(&[1]), vec![Arc::new(1u32)]);
        store.add_prefill_data(&types(&[2]), vec![Arc::new(2u32)]);

        assert!(!store.is_complete());
        assert!(!store.is_empty());
        assert_eq!(store.types(), types(&[1, 2]));
        assert_eq!(store.data_len(), 2);
    }

    #[test]
    fn test_set_data_replaces_and_unions_types() {
        let store = TileData::new();
        store.add_prefill_data(&types(&[1]), vec![Arc::new(10u32)]);
        store.set_data(&types(&[2]), vec![Arc::new(20u32)]);
        store.set_data(&types(&[3]), vec![Arc::new(30u32)]);

        assert!(store.is_complete());
        assert_eq!(store.types(), types(&[1, 2, 3]));
        let values: Vec<u32> = store.snapshot().iter().map(|v| **v).collect();
        assert_eq!(values, vec![10, 30]);
    }

    #[test]
    fn test_add_data_appends() {
        let store = TileData::new();
        store.set_data(&types(&[1]), vec![Arc::new(1u32)]);
        store.add_data(&types(&[2]), vec![Arc::new(2u32), Arc::new(3u32)]);

        assert_eq!(store.data_len(), 3);
        assert_eq!(store.types(), types(&[1, 2]));
    }

    #[test]
    fn test_copy_data_visits_prefill_first() {
        let store = TileData::new();
        store.set_data(&types(&[1]), vec![Arc::new(2u32)]);
        store.add_prefill_data(&types(&[1]), vec![Arc::new(1u32)]);

        let mut seen = Vec::new();
        store.copy_data(|value| seen.push(**value));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_invalidate_keeps_data() {
        let store = TileData::new();
        store.set_data(&types(&[1]), vec![Arc::new(1u32)]);
        store.invalidate();

        assert!(!store.is_complete());
        assert_eq!(store.data_len(), 1);
        assert_eq!(store.types(), types(&[1]));

        store.set_complete();
        assert!(store.is_complete());
    }
}
