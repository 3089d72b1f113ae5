//! Configuration file handling for ~/.tiledmap/config.ini.
//!
//! Missing files and missing keys fall back to the defaults of
//! [`MapServiceConfig`](super::MapServiceConfig).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use thiserror::Error;

use super::SearchSettings;
use crate::cache::DEFAULT_CACHE_SIZE;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// `[cache] size`
    pub cache_size: usize,
    /// `[search]`
    pub search: SearchSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            search: SearchSettings::default(),
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tiledmap/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::WriteError)?;
        }
        std::fs::write(path, self.to_config_string()).map_err(ConfigFileError::WriteError)
    }

    /// Commented INI representation as written by [`save_to`](Self::save_to).
    pub fn to_config_string(&self) -> String {
        format!(
            r#"[cache]
; Maximum number of tiles kept in memory (default: {DEFAULT_CACHE_SIZE})
; Tiles still referenced by a caller are never evicted, so the cache may
; temporarily hold more.
size = {}

[search]
; Areas are loaded up to this many levels above the current zoom (default: 4)
max_area_level = {}
; Use precomputed low zoom ways and areas where available (default: true)
low_zoom_optimization = {}
; Carried to the search parameter (default: false)
multithreading = {}
; Load the member ways of every route (default: false)
resolve_route_members = {}
"#,
            self.cache_size,
            self.search.max_area_level,
            self.search.low_zoom_optimization,
            self.search.multithreading,
            self.search.resolve_route_members,
        )
    }
}

/// Overlays the values found in `ini` on the defaults.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(size) = parse_value(section, "cache", "size", "must be a non-negative integer")? {
            config.cache_size = size;
        }
    }

    // [search] section
    if let Some(section) = ini.section(Some("search")) {
        let search = &mut config.search;
        if let Some(v) =
            parse_value(section, "search", "max_area_level", "must be a non-negative integer")?
        {
            search.max_area_level = v;
        }
        if let Some(v) = parse_flag(section, "low_zoom_optimization")? {
            search.low_zoom_optimization = v;
        }
        if let Some(v) = parse_flag(section, "multithreading")? {
            search.multithreading = v;
        }
        if let Some(v) = parse_flag(section, "resolve_route_members")? {
            search.resolve_route_members = v;
        }
    }

    Ok(config)
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    let Some(value) = section.get(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section_name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        })
}

fn parse_flag(section: &Properties, key: &str) -> Result<Option<bool>, ConfigFileError> {
    let Some(value) = section.get(key) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        _ => Err(ConfigFileError::InvalidValue {
            section: "search".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be true or false".to_string(),
        }),
    }
}

/// Get the path to the config directory (~/.tiledmap).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tiledmap")
}

/// Get the path to the config file (~/.tiledmap/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
