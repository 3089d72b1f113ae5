//! Map service
//!
//! [`MapService`] is the entry point for renderers. It hands out cached
//! tiles for a viewport and fills in whatever data they are missing:
//!
//! ```text
//! lookup_tiles(magnification, bbox)
//!        │
//!        ▼
//! load_missing_tile_data(parameter, style, tiles)
//!        │  per incomplete tile: prefill from parent, then one job per category
//!        │  (prefilled tiles are reported once the state lock is released)
//!        ▼
//! ┌──────────┬──────────┬──────────────┬──────────┬───────────────┬───────────┐
//! │NodeLoader│WayLoader │WayLowZoom... │AreaLoader│AreaLowZoom... │RouteLoader│
//! └──────────┴──────────┴──────────────┴──────────┴───────────────┴───────────┘
//!        │  index query → sorted batch read → store → notify callbacks
//!        ▼
//! add_tile_data_to_map_data(tiles) → MapData
//! ```
//!
//! Each category has its own worker thread and FIFO queue. The synchronous
//! load blocks until every job finished and reports the conjunction of their
//! results. The asynchronous variants only dispatch; progress is observable
//! through tile state callbacks.
//!
//! Two dispatch modes exist. The style path loads authoritative data and
//! completes categories. The explicit type definition path only adds to the
//! prefill buffers and never completes anything.

mod callbacks;
mod loader;
mod map_data;
mod parameter;
mod worker;

pub use callbacks::{CallbackId, CallbackRegistry, TileStateCallback};
pub use loader::LoadMode;
pub use map_data::{add_tile_data_to_map_data, add_tile_data_to_map_data_filtered, MapData};
pub use parameter::{AreaSearchParameter, AtomicBreaker, Breaker, DEFAULT_MAX_AREA_LEVEL};
pub use worker::WorkerQueue;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cache::TileCache;
use crate::config::MapServiceConfig;
use crate::coord::{GeoBox, Magnification, TileId};
use crate::database::Database;
use crate::error::{LoadError, ServiceError};
use crate::style::{StyleProvider, TypeDefinition};
use crate::tile::{Category, TileRef};
use crate::types::TypeSet;

use loader::{LoadContext, LoadJob};

/// Dispatching a single tile slower than this is logged.
const SLOW_TILE_DISPATCH: Duration = Duration::from_millis(150);

/// A whole load call slower than this is logged.
const SLOW_LOAD: Duration = Duration::from_millis(200);

/// The six category worker queues.
struct WorkerQueues {
    node: WorkerQueue,
    way: WorkerQueue,
    way_low_zoom: WorkerQueue,
    area: WorkerQueue,
    area_low_zoom: WorkerQueue,
    route: WorkerQueue,
}

impl WorkerQueues {
    fn spawn() -> Result<Self, ServiceError> {
        let spawn = |worker: &'static str| {
            WorkerQueue::spawn(worker).map_err(|source| ServiceError::WorkerSpawn { worker, source })
        };
        Ok(Self {
            node: spawn("NodeLoader")?,
            way: spawn("WayLoader")?,
            way_low_zoom: spawn("WayLowZoomLoader")?,
            area: spawn("AreaLoader")?,
            area_low_zoom: spawn("AreaLowZoomLoader")?,
            route: spawn("RouteLoader")?,
        })
    }

    fn for_category(&self, category: Category) -> &WorkerQueue {
        match category {
            Category::Node => &self.node,
            Category::Way => &self.way,
            Category::OptimizedWay => &self.way_low_zoom,
            Category::Area => &self.area,
            Category::OptimizedArea => &self.area_low_zoom,
            Category::Route => &self.route,
        }
    }

    fn stop(&self) {
        for queue in [
            &self.node,
            &self.way,
            &self.way_low_zoom,
            &self.area,
            &self.area_low_zoom,
            &self.route,
        ] {
            queue.stop();
        }
    }
}

/// How type sets are obtained for a dispatch.
enum TypeSource<'a> {
    Style(&'a dyn StyleProvider),
    Definition(Magnification, &'a TypeDefinition),
}

/// Tile cache plus concurrent loader for one database.
pub struct MapService {
    database: Arc<Database>,
    cache: TileCache,
    callbacks: Arc<CallbackRegistry>,
    context: Arc<LoadContext>,
    queues: WorkerQueues,
    default_parameter: AreaSearchParameter,
    /// Serializes tile lookup and job dispatch.
    state: Mutex<()>,
}

impl MapService {
    /// Creates the service and starts its six worker threads.
    ///
    /// # Arguments
    ///
    /// * `database` - The database to load from
    /// * `config` - Cache size and default search settings
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::WorkerSpawn`] if a worker thread cannot be started.
    pub fn new(database: Arc<Database>, config: &MapServiceConfig) -> Result<Self, ServiceError> {
        let callbacks = Arc::new(CallbackRegistry::new());
        let context = Arc::new(LoadContext {
            database: database.clone(),
            callbacks: callbacks.clone(),
        });
        let queues = WorkerQueues::spawn()?;

        info!(
            cache_size = config.cache_size,
            low_zoom = config.search.low_zoom_optimization,
            "Map service started"
        );

        Ok(Self {
            database,
            cache: TileCache::new(config.cache_size),
            callbacks,
            context,
            queues,
            default_parameter: config.search.to_parameter(),
            state: Mutex::new(()),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Search parameter built from the service configuration.
    pub fn default_parameter(&self) -> AreaSearchParameter {
        self.default_parameter.clone()
    }

    // =========================================================================
    // Type definitions
    // =========================================================================

    /// Computes the types to load at `magnification` for `style`.
    ///
    /// With the low zoom optimization enabled, way and area types covered by
    /// an optimized source that has data for this magnification are moved
    /// to the optimized sets.
    pub fn type_definition(
        &self,
        parameter: &AreaSearchParameter,
        style: &dyn StyleProvider,
        magnification: Magnification,
    ) -> TypeDefinition {
        let mut definition = style.required_types(magnification);

        if parameter.use_low_zoom_optimization() {
            if let Some(source) = self.database.optimized_areas() {
                if source.has_optimizations(magnification) {
                    definition.route_low_zoom_areas(&source.types);
                }
            }
            if let Some(source) = self.database.optimized_ways() {
                if source.has_optimizations(magnification) {
                    definition.route_low_zoom_ways(&source.types);
                }
            }
        }

        definition
    }

    // =========================================================================
    // Tile lookup
    // =========================================================================

    /// Returns the tiles covering `bbox`, row-major.
    ///
    /// Tiles not cached before are returned empty.
    pub fn lookup_tiles(&self, magnification: Magnification, bbox: &GeoBox) -> Vec<TileRef> {
        let _state = self.state.lock();
        self.cache.tiles_for_bounding_box(magnification, bbox)
    }

    /// Returns the tile with `id`, creating an empty one if needed.
    pub fn lookup_tile(&self, id: TileId) -> TileRef {
        let _state = self.state.lock();
        self.cache.get_tile(id)
    }

    /// Prefills incomplete `tiles` from their cached parents.
    ///
    /// Tiles that received data are reported to the tile state callbacks.
    pub fn prefill_tiles(&self, tiles: &[TileRef], types: &TypeDefinition) {
        for tile in tiles.iter().filter(|tile| !tile.is_complete()) {
            if self.cache.prefill_data_from_cache(tile, types) {
                self.callbacks.notify(tile);
            }
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads all data `style` needs for `tiles` and waits for it.
    ///
    /// # Returns
    ///
    /// `true` if every category of every tile loaded. `false` means some
    /// data may be missing or stale; whatever did load stays usable.
    pub fn load_missing_tile_data(
        &self,
        parameter: &AreaSearchParameter,
        style: &dyn StyleProvider,
        tiles: &[TileRef],
    ) -> bool {
        self.load_blocking(parameter, TypeSource::Style(style), tiles)
    }

    /// Starts loading all data `style` needs for `tiles` without waiting.
    ///
    /// # Returns
    ///
    /// `true` if the jobs were dispatched. Completion is reported through
    /// tile state callbacks.
    pub fn load_missing_tile_data_async(
        &self,
        parameter: &AreaSearchParameter,
        style: &dyn StyleProvider,
        tiles: &[TileRef],
    ) -> bool {
        self.dispatch(parameter, TypeSource::Style(style), tiles)
            .is_some()
    }

    /// Starts loading like [`load_missing_tile_data`](Self::load_missing_tile_data)
    /// and returns a future resolving to the combined result.
    ///
    /// Jobs are dispatched before this returns; the future only waits.
    pub fn load_missing_tile_data_awaitable(
        &self,
        parameter: &AreaSearchParameter,
        style: &dyn StyleProvider,
        tiles: &[TileRef],
    ) -> impl Future<Output = bool> + Send + 'static {
        let receivers = self.dispatch(parameter, TypeSource::Style(style), tiles);
        async move {
            match receivers {
                Some(receivers) => join_results(receivers).await,
                None => false,
            }
        }
    }

    /// Loads the given types for `tiles` into their prefill buffers and waits.
    ///
    /// Categories are never marked complete by this call.
    pub fn load_missing_tile_data_with_types(
        &self,
        parameter: &AreaSearchParameter,
        magnification: Magnification,
        types: &TypeDefinition,
        tiles: &[TileRef],
    ) -> bool {
        self.load_blocking(
            parameter,
            TypeSource::Definition(magnification, types),
            tiles,
        )
    }

    /// Asynchronous variant of
    /// [`load_missing_tile_data_with_types`](Self::load_missing_tile_data_with_types).
    pub fn load_missing_tile_data_with_types_async(
        &self,
        parameter: &AreaSearchParameter,
        magnification: Magnification,
        types: &TypeDefinition,
        tiles: &[TileRef],
    ) -> bool {
        self.dispatch(
            parameter,
            TypeSource::Definition(magnification, types),
            tiles,
        )
        .is_some()
    }

    fn load_blocking(
        &self,
        parameter: &AreaSearchParameter,
        types: TypeSource<'_>,
        tiles: &[TileRef],
    ) -> bool {
        if worker::is_worker_thread() {
            // Waiting here would block the queue the jobs are pushed to
            warn!("Blocking load requested from a worker thread, dispatching only");
            self.dispatch(parameter, types, tiles);
            return false;
        }

        let started = Instant::now();
        let success = match self.dispatch(parameter, types, tiles) {
            Some(receivers) => futures::executor::block_on(join_results(receivers)),
            None => false,
        };

        let elapsed = started.elapsed();
        if elapsed > SLOW_LOAD {
            warn!(
                tiles = tiles.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Retrieving all tile data was slow"
            );
        }
        success
    }

    /// Pushes the jobs for every incomplete tile.
    ///
    /// Tiles that received data from their parent are reported to the tile
    /// state callbacks once the state lock is released.
    ///
    /// Returns `None` without dispatching if the database is closed or the
    /// breaker already fired.
    fn dispatch(
        &self,
        parameter: &AreaSearchParameter,
        types: TypeSource<'_>,
        tiles: &[TileRef],
    ) -> Option<Vec<oneshot::Receiver<bool>>> {
        if !self.database.is_open() {
            warn!("Cannot load tile data, {}", LoadError::DatabaseClosed);
            return None;
        }
        if parameter.is_aborted() {
            debug!("Load aborted before dispatch");
            return None;
        }

        let state = self.state.lock();
        let mut receivers = Vec::new();
        let mut prefilled = Vec::new();
        let mut definitions: HashMap<Magnification, TypeDefinition> = HashMap::new();

        for tile in tiles.iter().filter(|tile| !tile.is_complete()) {
            let started = Instant::now();

            let (magnification, definition, mode) = match &types {
                TypeSource::Style(style) => {
                    let magnification = tile.id().magnification();
                    let definition = definitions
                        .entry(magnification)
                        .or_insert_with(|| self.type_definition(parameter, *style, magnification));
                    (magnification, &*definition, LoadMode::Authoritative)
                }
                TypeSource::Definition(magnification, definition) => {
                    (*magnification, *definition, LoadMode::Prefill)
                }
            };

            if self.cache.prefill_data_from_cache(tile, definition) {
                prefilled.push(tile.clone());
            }

            let job = |category: Category, types: &TypeSet| LoadJob {
                tile: tile.clone(),
                category,
                types: types.clone(),
                magnification,
                parameter: parameter.clone(),
                mode,
            };

            receivers.push(self.push(job(Category::Node, &definition.node_types)));

            if parameter.use_low_zoom_optimization() {
                receivers.push(self.push(job(
                    Category::OptimizedArea,
                    &definition.optimized_area_types,
                )));
            } else if mode == LoadMode::Authoritative {
                tile.optimized_areas().set_complete();
            }

            receivers.push(self.push(job(Category::Area, &definition.area_types)));

            if parameter.use_low_zoom_optimization() {
                receivers.push(self.push(job(
                    Category::OptimizedWay,
                    &definition.optimized_way_types,
                )));
            } else if mode == LoadMode::Authoritative {
                tile.optimized_ways().set_complete();
            }

            receivers.push(self.push(job(Category::Way, &definition.way_types)));
            receivers.push(self.push(job(Category::Route, &definition.route_types)));

            let elapsed = started.elapsed();
            if elapsed > SLOW_TILE_DISPATCH {
                warn!(
                    tile = %tile.id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Retrieving tile data was slow"
                );
            }
        }

        debug!(tiles = tiles.len(), jobs = receivers.len(), "Dispatched tile loads");
        self.cache.cleanup();
        drop(state);

        for tile in &prefilled {
            self.callbacks.notify(tile);
        }
        Some(receivers)
    }

    fn push(&self, job: LoadJob) -> oneshot::Receiver<bool> {
        let queue = self.queues.for_category(job.category);
        if !queue.is_running() {
            warn!(tile = %job.tile.id(), "{}", LoadError::QueueStopped(job.category));
        }
        let context = self.context.clone();
        queue.push(move || job.run(&context))
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Appends the data of `tiles` to `data`, unique by file offset.
    pub fn add_tile_data_to_map_data(&self, tiles: &[TileRef], data: &mut MapData) {
        add_tile_data_to_map_data(tiles, data);
    }

    /// Appends the data of `tiles` whose types are in `types` to `data`.
    pub fn add_tile_data_to_map_data_filtered(
        &self,
        tiles: &[TileRef],
        types: &TypeDefinition,
        data: &mut MapData,
    ) {
        add_tile_data_to_map_data_filtered(tiles, types, data);
    }

    // =========================================================================
    // Cache management
    // =========================================================================

    pub fn cache_size(&self) -> usize {
        self.cache.size()
    }

    /// Changes the cache size limit, evicting immediately if it shrank.
    pub fn set_cache_size(&self, size: usize) {
        self.cache.set_size(size);
    }

    /// Number of tiles currently cached.
    pub fn current_cache_size(&self) -> usize {
        self.cache.current_size()
    }

    /// Drops every cached tile nobody else holds.
    pub fn flush_tile_cache(&self) {
        let evicted = self.cache.flush();
        debug!(evicted, "Flushed tile cache");
    }

    /// Marks every cached tile stale so the next load checks it again.
    pub fn invalidate_tile_cache(&self) {
        self.cache.invalidate();
    }

    /// Evicts least recently used tiles down to the size limit.
    pub fn cleanup_tile_cache(&self) {
        self.cache.cleanup();
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// Registers a callback invoked whenever a tile changed.
    ///
    /// Callbacks run on the category worker that stored the data, or on the
    /// loading thread right after a tile was prefilled from its parent. A
    /// callback may start further loads, but only through the `_async` or
    /// awaitable variants: a blocking load issued from a worker thread is
    /// dispatched without waiting and reports `false`.
    pub fn register_tile_state_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&TileRef) + Send + Sync + 'static,
    {
        self.callbacks.register(callback)
    }

    pub fn deregister_tile_state_callback(&self, id: CallbackId) -> bool {
        self.callbacks.deregister(id)
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops all worker queues after they finished their queued jobs.
    ///
    /// Loads requested afterwards report `false`.
    pub fn shutdown(&self) {
        self.queues.stop();
    }
}

impl Drop for MapService {
    fn drop(&mut self) {
        self.shutdown();
        debug!("Map service stopped");
    }
}

/// Waits for all job results; a job that never ran counts as failed.
async fn join_results(receivers: Vec<oneshot::Receiver<bool>>) -> bool {
    join_all(receivers)
        .await
        .into_iter()
        .fold(true, |success, result| success & result.unwrap_or(false))
}
