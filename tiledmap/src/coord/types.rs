//! Core geographic and tile types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::cell_dimension;

/// Highest magnification level with a precomputed cell dimension.
pub const MAX_LEVEL: u32 = 25;

/// Minimum latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude in degrees.
pub const MAX_LON: f64 = 180.0;

// =============================================================================
// Geographic coordinates
// =============================================================================

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// An axis aligned geographic bounding box.
///
/// Edges are inclusive: a coordinate lying exactly on the border is
/// considered inside, and two boxes sharing an edge intersect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min: GeoCoord,
    pub max: GeoCoord,
}

impl GeoBox {
    /// Creates a box from two arbitrary corners.
    pub fn new(a: GeoCoord, b: GeoCoord) -> Self {
        Self {
            min: GeoCoord::new(a.lat.min(b.lat), a.lon.min(b.lon)),
            max: GeoCoord::new(a.lat.max(b.lat), a.lon.max(b.lon)),
        }
    }

    /// Creates a box from its edges.
    pub fn from_bounds(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self::new(GeoCoord::new(min_lat, min_lon), GeoCoord::new(max_lat, max_lon))
    }

    /// Smallest box containing all given coordinates, `None` for an empty input.
    pub fn enclosing<'a, I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoCoord>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            min: *first,
            max: *first,
        };
        for coord in iter {
            bbox.include(coord);
        }
        Some(bbox)
    }

    /// Grows the box so that it contains `coord`.
    pub fn include(&mut self, coord: &GeoCoord) {
        self.min.lat = self.min.lat.min(coord.lat);
        self.min.lon = self.min.lon.min(coord.lon);
        self.max.lat = self.max.lat.max(coord.lat);
        self.max.lon = self.max.lon.max(coord.lon);
    }

    /// Grows the box so that it contains `other`.
    pub fn include_box(&mut self, other: &GeoBox) {
        self.include(&other.min);
        self.include(&other.max);
    }

    pub fn width(&self) -> f64 {
        self.max.lon - self.min.lon
    }

    pub fn height(&self) -> f64 {
        self.max.lat - self.min.lat
    }

    /// Returns true if the coordinate lies inside or on the border of the box.
    pub fn includes(&self, coord: &GeoCoord) -> bool {
        coord.lat >= self.min.lat
            && coord.lat <= self.max.lat
            && coord.lon >= self.min.lon
            && coord.lon <= self.max.lon
    }

    /// Returns true if both boxes share at least one point.
    pub fn intersects(&self, other: &GeoBox) -> bool {
        !(other.max.lon < self.min.lon
            || other.min.lon > self.max.lon
            || other.max.lat < self.min.lat
            || other.min.lat > self.max.lat)
    }
}

impl fmt::Display for GeoBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.min, self.max)
    }
}

// =============================================================================
// Magnification
// =============================================================================

/// Zoom level of a map view.
///
/// The magnification factor doubles with every level. Levels above
/// [`MAX_LEVEL`] are clamped since no cell dimension exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Magnification {
    level: u32,
}

impl Magnification {
    pub const WORLD: Self = Self::from_level(0);
    pub const CONTINENT: Self = Self::from_level(4);
    pub const STATE: Self = Self::from_level(5);
    pub const COUNTY: Self = Self::from_level(7);
    pub const REGION: Self = Self::from_level(8);
    pub const PROXIMITY: Self = Self::from_level(9);
    pub const CITY_OVER: Self = Self::from_level(10);
    pub const CITY: Self = Self::from_level(11);
    pub const SUBURB: Self = Self::from_level(12);
    pub const DETAIL: Self = Self::from_level(13);
    pub const CLOSE: Self = Self::from_level(14);
    pub const VERY_CLOSE: Self = Self::from_level(16);
    pub const BLOCK: Self = Self::from_level(18);
    pub const STREET: Self = Self::from_level(19);
    pub const HOUSE: Self = Self::from_level(20);

    /// Creates a magnification for the given level, clamped to [`MAX_LEVEL`].
    pub const fn from_level(level: u32) -> Self {
        let level = if level > MAX_LEVEL { MAX_LEVEL } else { level };
        Self { level }
    }

    /// Creates a magnification from a scale factor (`2^level`).
    ///
    /// Factors below 1 map to level 0.
    pub fn from_factor(factor: f64) -> Self {
        if !(factor >= 1.0) {
            return Self::WORLD;
        }
        Self::from_level(factor.log2().floor() as u32)
    }

    pub const fn level(&self) -> u32 {
        self.level
    }

    /// The scale factor, `2^level`.
    pub fn factor(&self) -> f64 {
        2.0_f64.powi(self.level as i32)
    }
}

impl fmt::Display for Magnification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.level)
    }
}

// =============================================================================
// Tile ids
// =============================================================================

/// Address of one grid cell at a given level.
///
/// Field order makes the derived ordering lexicographic on `(level, y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    level: u32,
    y: u32,
    x: u32,
}

impl TileId {
    /// Creates a tile id. The level is clamped to [`MAX_LEVEL`].
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self {
            level: level.min(MAX_LEVEL),
            y,
            x,
        }
    }

    /// Returns the tile at `magnification` that contains `coord`.
    pub fn containing(magnification: Magnification, coord: &GeoCoord) -> Self {
        let level = magnification.level();
        Self::new(level, super::cell_x(level, coord.lon), super::cell_y(level, coord.lat))
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn magnification(&self) -> Magnification {
        Magnification::from_level(self.level)
    }

    /// Geographic area covered by this tile.
    pub fn bounding_box(&self) -> GeoBox {
        let cell = cell_dimension(self.level);
        GeoBox::from_bounds(
            f64::from(self.y) * cell.height + MIN_LAT,
            f64::from(self.x) * cell.width + MIN_LON,
            (f64::from(self.y) + 1.0) * cell.height + MIN_LAT,
            (f64::from(self.x) + 1.0) * cell.width + MIN_LON,
        )
    }

    /// Returns the tile one level up covering four times the area.
    ///
    /// Level 0 tiles have no parent.
    pub fn parent(&self) -> Option<TileId> {
        if self.level == 0 {
            return None;
        }
        Some(Self::new(self.level - 1, self.x / 2, self.y / 2))
    }

    /// Short human readable form, `level.y.x`.
    pub fn display_text(&self) -> String {
        format!("{}.{}.{}", self.level, self.y, self.x)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.level, self.y, self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geobox_normalizes_corners() {
        let bbox = GeoBox::new(GeoCoord::new(10.0, 20.0), GeoCoord::new(5.0, 30.0));
        assert_eq!(bbox.min, GeoCoord::new(5.0, 20.0));
        assert_eq!(bbox.max, GeoCoord::new(10.0, 30.0));
    }

    #[test]
    fn test_geobox_includes_border() {
        let bbox = GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0);
        assert!(bbox.includes(&GeoCoord::new(0.0, 0.5)));
        assert!(bbox.includes(&GeoCoord::new(1.0, 1.0)));
        assert!(!bbox.includes(&GeoCoord::new(1.0001, 0.5)));
    }

    #[test]
    fn test_geobox_intersects() {
        let a = GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0);
        let b = GeoBox::from_bounds(1.0, 1.0, 2.0, 2.0);
        let c = GeoBox::from_bounds(1.5, 1.5, 2.0, 2.0);
        assert!(a.intersects(&b), "shared corner counts as intersection");
        assert!(!a.intersects(&c));
        assert!(c.intersects(&b));
    }

    #[test]
    fn test_geobox_enclosing() {
        let coords = [
            GeoCoord::new(1.0, 2.0),
            GeoCoord::new(-1.0, 5.0),
            GeoCoord::new(0.5, -3.0),
        ];
        let bbox = GeoBox::enclosing(coords.iter()).unwrap();
        assert_eq!(bbox, GeoBox::from_bounds(-1.0, -3.0, 1.0, 5.0));
        assert!(GeoBox::enclosing([].iter()).is_none());
    }

    #[test]
    fn test_magnification_clamps_level() {
        assert_eq!(Magnification::from_level(40).level(), MAX_LEVEL);
        assert_eq!(Magnification::CITY_OVER.level(), 10);
    }

    #[test]
    fn test_magnification_from_factor() {
        assert_eq!(Magnification::from_factor(1024.0).level(), 10);
        assert_eq!(Magnification::from_factor(1500.0).level(), 10);
        assert_eq!(Magnification::from_factor(0.5).level(), 0);
        assert_eq!(Magnification::from_factor(f64::NAN).level(), 0);
    }

    #[test]
    fn test_tile_id_ordering_is_level_y_x() {
        let mut ids = vec![
            TileId::new(2, 0, 1),
            TileId::new(1, 5, 5),
            TileId::new(2, 1, 0),
            TileId::new(2, 0, 0),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                TileId::new(1, 5, 5),
                TileId::new(2, 0, 0),
                TileId::new(2, 1, 0),
                TileId::new(2, 0, 1),
            ]
        );
    }

    #[test]
    fn test_tile_id_parent() {
        assert_eq!(TileId::new(0, 0, 0).parent(), None);
        assert_eq!(TileId::new(6, 13, 7).parent(), Some(TileId::new(5, 6, 3)));
    }

    #[test]
    fn test_parent_bounding_box_contains_child() {
        let child = TileId::new(6, 41, 17);
        let parent = child.parent().unwrap();
        let child_box = child.bounding_box();
        let parent_box = parent.bounding_box();

        assert!(parent_box.includes(&child_box.min));
        assert!(parent_box.includes(&child_box.max));
        assert!((parent_box.width() - 2.0 * child_box.width()).abs() < 1e-9);
        assert!((parent_box.height() - 2.0 * child_box.height()).abs() < 1e-9);
    }

    #[test]
    fn test_level_zero_covers_world() {
        let bbox = TileId::new(0, 0, 0).bounding_box();
        assert_eq!(bbox, GeoBox::from_bounds(-90.0, -180.0, 90.0, 180.0));
    }

    #[test]
    fn test_display_text() {
        let id = TileId::new(10, 3, 7);
        assert_eq!(id.display_text(), "10.7.3");
        assert_eq!(id.to_string(), "10.7.3");
    }

    #[test]
    fn test_bounding_box_of_out_of_grid_id_does_not_overflow() {
        let id = TileId::new(4, u32::MAX, u32::MAX);
        let bbox = id.bounding_box();
        assert!(bbox.max.lat > bbox.min.lat);
        assert!(bbox.max.lon > bbox.min.lon);
    }
}
