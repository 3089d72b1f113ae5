//! Error types for tile loading.
//!
//! Errors of the external collaborators live next to them
//! ([`DatabaseError`], [`ConfigFileError`](crate::config::ConfigFileError),
//! [`DatasetError`](crate::database::DatasetError)). [`LoadError`] is the
//! outcome of one failed (tile, category) load task. The service logs it and
//! reports `false` to its caller. [`ServiceError`] covers service startup.

use std::io;

use thiserror::Error;

pub use crate::database::DatabaseError;
use crate::tile::Category;

/// Why a single category load for a tile did not succeed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The caller's breaker fired before the data was stored.
    #[error("load aborted")]
    Aborted,

    /// The database has been closed.
    #[error("database is not open")]
    DatabaseClosed,

    /// The database has no source for this category.
    #[error("no {0} source available")]
    MissingSource(Category),

    /// Querying the spatial index failed.
    #[error("error querying {category} index: {source}")]
    Index {
        category: Category,
        #[source]
        source: DatabaseError,
    },

    /// Loading objects by offset failed.
    #[error("error loading {category} data: {source}")]
    Read {
        category: Category,
        #[source]
        source: DatabaseError,
    },

    /// The worker queue is no longer running.
    #[error("{0} queue stopped")]
    QueueStopped(Category),
}

/// Errors creating a [`MapService`](crate::service::MapService).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to start {worker} worker: {source}")]
    WorkerSpawn {
        worker: &'static str,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    /// Returns true for cooperative cancellation, which is not a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, LoadError::Aborted)
    }
}
