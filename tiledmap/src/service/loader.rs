//! Loading one category of one tile.
//!
//! A [`LoadJob`] is what gets pushed onto a category worker queue. Running
//! it follows a fixed sequence:
//!
//! 1. Fail fast if the database is closed or the breaker fired
//! 2. Succeed immediately if the category is already complete
//! 3. Compute the missing types (`requested − recorded`)
//! 4. Query the spatial index for them
//! 5. Sort the offsets ascending and batch load the objects
//! 6. Store them, mark the category complete and notify observers
//!
//! The breaker is polled again after the index query and after the batch
//! read. A job aborted before storing leaves the tile untouched. Loading is
//! all or nothing: a failed read stores nothing.

use std::sync::Arc;

use tracing::{debug, error};

use super::callbacks::CallbackRegistry;
use super::parameter::AreaSearchParameter;
use crate::coord::Magnification;
use crate::database::{
    Database, DatabaseError, IndexRequest, LowZoomSource, ObjectSource,
};
use crate::error::LoadError;
use crate::object::{MapObject, Route};
use crate::tile::{Category, TileData, TileRef};
use crate::types::TypeSet;

/// Whether loaded data is authoritative or only an approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Data is stored as tile data and the category is marked complete.
    Authoritative,
    /// Data is added to the prefill buffer and the category stays incomplete.
    Prefill,
}

/// Shared state every job needs.
pub(crate) struct LoadContext {
    pub database: Arc<Database>,
    pub callbacks: Arc<CallbackRegistry>,
}

/// One (tile, category) load.
pub(crate) struct LoadJob {
    pub tile: TileRef,
    pub category: Category,
    pub types: TypeSet,
    pub magnification: Magnification,
    pub parameter: AreaSearchParameter,
    pub mode: LoadMode,
}

impl LoadJob {
    /// Runs the job, logging failures.
    ///
    /// # Returns
    ///
    /// `true` if the category is now loaded for the requested types.
    pub fn run(self, context: &LoadContext) -> bool {
        let result = match self.category {
            Category::Node => self.load(
                context,
                context.database.nodes(),
                self.tile.nodes(),
                None,
                Ok,
            ),
            Category::Way => self.load(
                context,
                context.database.ways(),
                self.tile.ways(),
                None,
                Ok,
            ),
            Category::Area => self.load(
                context,
                context.database.areas(),
                self.tile.areas(),
                Some(self.magnification.level() + self.parameter.max_area_level()),
                Ok,
            ),
            Category::OptimizedWay => self.load_low_zoom(
                context,
                context.database.optimized_ways(),
                self.tile.optimized_ways(),
            ),
            Category::OptimizedArea => self.load_low_zoom(
                context,
                context.database.optimized_areas(),
                self.tile.optimized_areas(),
            ),
            Category::Route => self.load_routes(context),
        };

        match result {
            Ok(()) => true,
            Err(err) if err.is_aborted() => {
                debug!(tile = %self.tile.id(), category = %self.category, "Load aborted");
                false
            }
            Err(err) => {
                error!(
                    tile = %self.tile.id(),
                    category = %self.category,
                    error = %err,
                    "Failed to load tile data"
                );
                false
            }
        }
    }

    fn check_aborted(&self) -> Result<(), LoadError> {
        if self.parameter.is_aborted() {
            Err(LoadError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Marks the category complete on authoritative passes and notifies.
    fn finish_without_data<T>(&self, context: &LoadContext, store: &TileData<T>) {
        if self.mode == LoadMode::Authoritative {
            store.set_complete();
        }
        context.callbacks.notify(&self.tile);
    }

    fn load<T, F>(
        &self,
        context: &LoadContext,
        source: Option<&ObjectSource<T>>,
        store: &TileData<T>,
        area_level_limit: Option<u32>,
        finish: F,
    ) -> Result<(), LoadError>
    where
        T: MapObject,
        F: FnOnce(Vec<Arc<T>>) -> Result<Vec<Arc<T>>, DatabaseError>,
    {
        if !context.database.is_open() {
            return Err(LoadError::DatabaseClosed);
        }
        let source = source.ok_or(LoadError::MissingSource(self.category))?;
        self.check_aborted()?;
        if store.is_complete() {
            return Ok(());
        }

        self.load_from(context, source, store, area_level_limit, finish)
    }

    /// Loads from an optimized source, which may be absent or may not cover
    /// the magnification.
    fn load_low_zoom<T: MapObject>(
        &self,
        context: &LoadContext,
        source: Option<&LowZoomSource<T>>,
        store: &TileData<T>,
    ) -> Result<(), LoadError> {
        if !context.database.is_open() {
            return Err(LoadError::DatabaseClosed);
        }
        let Some(source) = source else {
            self.finish_without_data(context, store);
            return Err(LoadError::MissingSource(self.category));
        };
        if !source.has_optimizations(self.magnification) {
            self.finish_without_data(context, store);
            return Ok(());
        }
        self.check_aborted()?;
        if store.is_complete() {
            return Ok(());
        }

        self.load_from(context, &source.source, store, None, Ok)
    }

    /// Loads routes. Routes are optional, a database without them succeeds.
    fn load_routes(&self, context: &LoadContext) -> Result<(), LoadError> {
        if !context.database.is_open() {
            return Err(LoadError::DatabaseClosed);
        }
        if context.database.routes().is_none() {
            self.finish_without_data(context, self.tile.routes());
            return Ok(());
        }

        let resolve = self.parameter.resolve_route_members();
        let database = context.database.clone();
        self.load(
            context,
            context.database.routes(),
            self.tile.routes(),
            None,
            move |routes| {
                if resolve {
                    resolve_route_members(&database, routes)
                } else {
                    Ok(routes)
                }
            },
        )
    }

    fn load_from<T, F>(
        &self,
        context: &LoadContext,
        source: &ObjectSource<T>,
        store: &TileData<T>,
        area_level_limit: Option<u32>,
        finish: F,
    ) -> Result<(), LoadError>
    where
        T: MapObject,
        F: FnOnce(Vec<Arc<T>>) -> Result<Vec<Arc<T>>, DatabaseError>,
    {
        let cached = store.types();
        let required = self.types.difference(&cached);

        if !required.is_empty() {
            let request = IndexRequest {
                bbox: self.tile.bounding_box(),
                types: required,
                magnification: self.magnification,
                area_level_limit,
            };
            let result = source
                .index
                .get_offsets(&request)
                .map_err(|source| LoadError::Index {
                    category: self.category,
                    source,
                })?;
            self.check_aborted()?;

            let mut offsets = result.offsets;
            // Ascending offsets keep disk access sequential
            offsets.sort_unstable();
            offsets.dedup();

            let objects = if offsets.is_empty() {
                Vec::new()
            } else {
                let read_error = |source| LoadError::Read {
                    category: self.category,
                    source,
                };
                let objects = source.loader.load_by_offsets(&offsets).map_err(read_error)?;
                finish(objects).map_err(read_error)?
            };
            self.check_aborted()?;

            debug!(
                tile = %self.tile.id(),
                category = %self.category,
                types = %result.found_types,
                objects = objects.len(),
                "Loaded tile data"
            );

            match self.mode {
                LoadMode::Prefill => store.add_prefill_data(&result.found_types, objects),
                LoadMode::Authoritative if cached.is_empty() => {
                    store.set_data(&result.found_types, objects)
                }
                LoadMode::Authoritative => store.add_data(&result.found_types, objects),
            }
        }

        self.finish_without_data(context, store);
        self.check_aborted()
    }
}

/// Attaches the member ways to every route that has unresolved members.
///
/// Fails as a whole if any member cannot be loaded.
fn resolve_route_members(
    database: &Database,
    routes: Vec<Arc<Route>>,
) -> Result<Vec<Arc<Route>>, DatabaseError> {
    let Some(ways) = database.ways() else {
        return Ok(routes);
    };

    routes
        .into_iter()
        .map(|route| {
            if route.member_offsets.is_empty() || !route.members.is_empty() {
                return Ok(route);
            }
            let mut offsets = route.member_offsets.clone();
            offsets.sort_unstable();
            offsets.dedup();
            let members = ways.loader.load_by_offsets(&offsets)?;

            let mut resolved = Route::clone(&route);
            resolved.members = members;
            Ok(Arc::new(resolved))
        })
        .collect()
}
