//! Service configuration.
//!
//! [`MapServiceConfig`] is what [`MapService::new`](crate::service::MapService::new)
//! takes. It can be built in code with the `with_*` setters or read from
//! `~/.tiledmap/config.ini` through [`ConfigFile`].

mod file;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::service::{AreaSearchParameter, DEFAULT_MAX_AREA_LEVEL};

/// Default search settings applied to every load unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// How many levels above the magnification areas are still loaded.
    pub max_area_level: u32,
    /// Route low zoom types to the optimized sources.
    pub low_zoom_optimization: bool,
    /// Carried through to the search parameter.
    pub multithreading: bool,
    /// Attach member ways to loaded routes.
    pub resolve_route_members: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_area_level: DEFAULT_MAX_AREA_LEVEL,
            low_zoom_optimization: true,
            multithreading: false,
            resolve_route_members: false,
        }
    }
}

impl SearchSettings {
    /// Builds a search parameter without a breaker.
    pub fn to_parameter(&self) -> AreaSearchParameter {
        AreaSearchParameter::new()
            .with_max_area_level(self.max_area_level)
            .with_low_zoom_optimization(self.low_zoom_optimization)
            .with_multithreading(self.multithreading)
            .with_resolve_route_members(self.resolve_route_members)
    }
}

/// Configuration of a [`MapService`](crate::service::MapService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapServiceConfig {
    /// Tile cache size limit in tiles.
    pub cache_size: usize,
    pub search: SearchSettings,
}

impl Default for MapServiceConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            search: SearchSettings::default(),
        }
    }
}

impl MapServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_max_area_level(mut self, level: u32) -> Self {
        self.search.max_area_level = level;
        self
    }

    pub fn with_low_zoom_optimization(mut self, enabled: bool) -> Self {
        self.search.low_zoom_optimization = enabled;
        self
    }

    pub fn with_multithreading(mut self, enabled: bool) -> Self {
        self.search.multithreading = enabled;
        self
    }

    pub fn with_resolve_route_members(mut self, enabled: bool) -> Self {
        self.search.resolve_route_members = enabled;
        self
    }
}

impl From<&ConfigFile> for MapServiceConfig {
    fn from(file: &ConfigFile) -> Self {
        Self {
            cache_size: file.cache_size,
            search: file.search.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapServiceConfig::default();
        assert_eq!(config.cache_size, 25);
        assert_eq!(config.search.max_area_level, 4);
        assert!(config.search.low_zoom_optimization);
        assert!(!config.search.multithreading);
        assert!(!config.search.resolve_route_members);
    }

    #[test]
    fn test_builder_and_parameter() {
        let config = MapServiceConfig::new()
            .with_cache_size(100)
            .with_max_area_level(2)
            .with_low_zoom_optimization(false)
            .with_resolve_route_members(true);

        assert_eq!(config.cache_size, 100);
        let parameter = config.search.to_parameter();
        assert_eq!(parameter.max_area_level(), 2);
        assert!(!parameter.use_low_zoom_optimization());
        assert!(parameter.resolve_route_members());
        assert!(!parameter.is_aborted());
    }
}
