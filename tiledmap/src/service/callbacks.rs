//! Tile state observers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::tile::TileRef;

/// Callback invoked whenever data of a tile changed.
///
/// Called from worker threads after a store, and from the loading thread
/// after a parent prefill. Never called with a lock of the service held.
pub type TileStateCallback = Arc<dyn Fn(&TileRef) + Send + Sync>;

/// Handle returned on registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// Registry of tile state callbacks.
///
/// Guarded by its own lock. Callbacks are invoked after the lock has been
/// released, so they may register or deregister callbacks themselves.
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<CallbackId, TileStateCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&TileRef) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().insert(id, Arc::new(callback));
        id
    }

    /// Removes a callback. Returns false if the id was not registered.
    pub fn deregister(&self, id: CallbackId) -> bool {
        self.callbacks.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }

    /// Invokes every registered callback with `tile`, in registration order.
    pub fn notify(&self, tile: &TileRef) {
        let callbacks: Vec<TileStateCallback> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(tile);
        }
    }
}
