//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use tiledmap::config::{config_file_path, ConfigFile};
use tiledmap::coord::{covering_count, GeoBox, Magnification, MAX_LEVEL};

use crate::error::CliError;

/// Parse a bounding box given as `minlat,minlon,maxlat,maxlon`.
///
/// Used as a clap value parser.
pub fn parse_bbox(value: &str) -> Result<GeoBox, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{}': {}", value, e))?;

    let [min_lat, min_lon, max_lat, max_lon] = parts[..] else {
        return Err(format!(
            "expected minlat,minlon,maxlat,maxlon but got {} values",
            parts.len()
        ));
    };

    if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
        return Err("latitude must be between -90 and 90".to_string());
    }
    if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
        return Err("longitude must be between -180 and 180".to_string());
    }

    Ok(GeoBox::from_bounds(min_lat, min_lon, max_lat, max_lon))
}

/// Check a magnification level against the supported range.
pub fn validate_level(level: u32) -> Result<u32, CliError> {
    if level > MAX_LEVEL {
        return Err(CliError::Config(format!(
            "level {} is above the maximum of {}",
            level, MAX_LEVEL
        )));
    }
    Ok(level)
}

/// Largest number of tiles a single command will enumerate.
pub const MAX_TILES: u64 = 65_536;

/// Reject requests covering more than [`MAX_TILES`] tiles.
pub fn validate_tile_count(magnification: Magnification, bbox: &GeoBox) -> Result<u64, CliError> {
    let count = covering_count(magnification, bbox);
    if count > MAX_TILES {
        return Err(CliError::Config(format!(
            "bounding box covers {} tiles at level {}, the limit is {}",
            count,
            magnification.level(),
            MAX_TILES
        )));
    }
    Ok(count)
}

/// Resolve the configuration file path, falling back to ~/.tiledmap/config.ini.
pub fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(config_file_path)
}

/// Load the configuration file; a missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_from(&resolve_config_path(path))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("50.0, 8.0,50.5,8.5").unwrap();
        assert_eq!(bbox.min.lat, 50.0);
        assert_eq!(bbox.min.lon, 8.0);
        assert_eq!(bbox.max.lat, 50.5);
        assert_eq!(bbox.max.lon, 8.5);
    }

    #[test]
    fn test_parse_bbox_normalizes_corners() {
        let bbox = parse_bbox("50.5,8.5,50.0,8.0").unwrap();
        assert_eq!(bbox.min.lat, 50.0);
        assert_eq!(bbox.max.lon, 8.5);
    }

    #[test]
    fn test_parse_bbox_rejects_bad_input() {
        assert!(parse_bbox("50.0,8.0,50.5").is_err());
        assert!(parse_bbox("50.0,8.0,north,8.5").is_err());
        assert!(parse_bbox("95.0,8.0,50.5,8.5").is_err());
        assert!(parse_bbox("50.0,190.0,50.5,8.5").is_err());
    }

    #[test]
    fn test_validate_level() {
        assert_eq!(validate_level(12).unwrap(), 12);
        assert!(validate_level(MAX_LEVEL + 1).is_err());
    }

    #[test]
    fn test_validate_tile_count() {
        let world = GeoBox::from_bounds(-90.0, -180.0, 90.0, 180.0);
        assert_eq!(validate_tile_count(Magnification::from_level(2), &world).unwrap(), 16);
        assert!(validate_tile_count(Magnification::from_level(MAX_LEVEL), &world).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[cache]\nsize = 7\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cache_size, 7);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.ini");

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}
