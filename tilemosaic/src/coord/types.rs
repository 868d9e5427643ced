//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported zoom levels. 2^23 tiles per axis still fits comfortably in a u32.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 23;

/// Number of tiles along one axis of the pyramid at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Tile index in the slippy-map pyramid.
///
/// `x` grows eastward and `y` grows southward, both in `[0, 2^z - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    /// Column (west to east)
    pub x: u32,
    /// Row (north to south)
    pub y: u32,
    /// Zoom level
    pub z: u8,
}

impl TileIndex {
    /// Creates a tile index, rejecting values outside the pyramid.
    pub fn new(x: u32, y: u32, z: u8) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let n = tiles_per_axis(z);
        if x >= n || y >= n {
            return Err(CoordError::TileOutOfRange { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    /// Deterministic scratch file stem: `{x}_{y}_{z}`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.x, self.y, self.z)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={} y={} z={}", self.x, self.y, self.z)
    }
}

/// Geographic bounding box in decimal degrees (EPSG:4326 axis order lon/lat).
///
/// A zero-area box (min equal to max on an axis) is accepted; it still plans
/// to at least one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl GeoBoundingBox {
    /// Creates a validated bounding box.
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Result<Self, CoordError> {
        for v in [lon_min, lat_min, lon_max, lat_max] {
            if !v.is_finite() {
                return Err(CoordError::NonFinite(v));
            }
        }
        for lon in [lon_min, lon_max] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        for lat in [lat_min, lat_max] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        if lon_min > lon_max || lat_min > lat_max {
            return Err(CoordError::InvertedBounds {
                lon_min,
                lat_min,
                lon_max,
                lat_max,
            });
        }
        Ok(Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        })
    }

    /// Builds the smallest box containing every `(lon, lat)` point.
    ///
    /// Returns `None` for an empty iterator. No range validation is applied,
    /// so this is also usable for projected coordinates.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = Self {
            lon_min: x0,
            lat_min: y0,
            lon_max: x0,
            lat_max: y0,
        };
        for (x, y) in iter {
            bbox.lon_min = bbox.lon_min.min(x);
            bbox.lat_min = bbox.lat_min.min(y);
            bbox.lon_max = bbox.lon_max.max(x);
            bbox.lat_max = bbox.lat_max.max(y);
        }
        Some(bbox)
    }

    /// Returns a copy with both latitudes clamped into the Mercator range.
    pub fn clamped_to_mercator(&self) -> Self {
        Self {
            lat_min: super::clamp_lat(self.lat_min),
            lat_max: super::clamp_lat(self.lat_max),
            ..*self
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            lon_min: self.lon_min.min(other.lon_min),
            lat_min: self.lat_min.min(other.lat_min),
            lon_max: self.lon_max.max(other.lon_max),
            lat_max: self.lat_max.max(other.lat_max),
        }
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// True when `(lon, lat)` lies inside the box (west/north edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon < self.lon_max && lat > self.lat_min && lat <= self.lat_max
    }
}

impl fmt::Display for GeoBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6},{:.6},{:.6},{:.6}",
            self.lon_min, self.lat_min, self.lon_max, self.lat_max
        )
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside the valid range for the operation
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    InvalidZoom(u8),
    /// NaN or infinite input
    NonFinite(f64),
    /// Bounding box minimum exceeds its maximum
    InvertedBounds {
        lon_min: f64,
        lat_min: f64,
        lon_max: f64,
        lat_max: f64,
    },
    /// Tile index outside `[0, 2^z - 1]`
    TileOutOfRange { x: u32, y: u32, z: u8 },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between {} and {})",
                    zoom, MIN_ZOOM, MAX_ZOOM
                )
            }
            CoordError::NonFinite(v) => write!(f, "Coordinate is not a finite number: {}", v),
            CoordError::InvertedBounds {
                lon_min,
                lat_min,
                lon_max,
                lat_max,
            } => {
                write!(
                    f,
                    "Invalid bounding box {},{},{},{}: minimum exceeds maximum",
                    lon_min, lat_min, lon_max, lat_max
                )
            }
            CoordError::TileOutOfRange { x, y, z } => {
                write!(
                    f,
                    "Tile ({}, {}) is outside the {}x{} grid at zoom {}",
                    x,
                    y,
                    tiles_per_axis(*z),
                    tiles_per_axis(*z),
                    z
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
