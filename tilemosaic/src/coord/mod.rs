//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator slippy-map tile coordinates, plus the inverse mapping
//! from a tile index to the geographic edges used for geo-tagging.

mod types;


pub use types::{
    tiles_per_axis, CoordError, GeoBoundingBox, TileIndex, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT,
    MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Clamps a latitude into the range where Web Mercator is defined.
#[inline]
pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(MIN_LAT, MAX_LAT)
}

/// Converts geographic coordinates to fractional tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees, already clamped to ±85.05112878
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 23)
///
/// # Returns
///
/// `(xf, yf)` where the integer part is the tile index and the fractional
/// part the position inside the tile. A latitude outside the Mercator range
/// is rejected rather than producing an infinite row.
#[inline]
pub fn geo_to_tile_fraction(lat: f64, lon: f64, zoom: u8) -> Result<(f64, f64), CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = tiles_per_axis(zoom) as f64;

    let xf = (lon + 180.0) / 360.0 * n;

    let lat_rad = lat.to_radians();
    let yf = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;

    Ok((xf, yf))
}

/// Returns the tile containing the given point.
///
/// Points on the east edge (lon = 180) or the southern Mercator limit fall
/// exactly on `2^z`; they are assigned to the last tile instead of wrapping.
pub fn tile_containing(lat: f64, lon: f64, zoom: u8) -> Result<TileIndex, CoordError> {
    let (xf, yf) = geo_to_tile_fraction(lat, lon, zoom)?;
    let max_index = tiles_per_axis(zoom) - 1;
    let x = (xf.floor().max(0.0) as u32).min(max_index);
    let y = (yf.floor().max(0.0) as u32).min(max_index);
    Ok(TileIndex { x, y, z: zoom })
}

/// Latitude of a Mercator row position expressed as a fraction of the grid.
#[inline]
fn mercator_to_lat(relative_y: f64) -> f64 {
    (PI * (1.0 - 2.0 * relative_y)).sinh().atan().to_degrees()
}

/// Returns `(lat_top, lat_bottom)` of tile row `y` at `zoom`.
#[inline]
pub fn tile_to_lat_edges(y: u32, zoom: u8) -> (f64, f64) {
    let unit = 1.0 / tiles_per_axis(zoom) as f64;
    let top = y as f64 * unit;
    (mercator_to_lat(top), mercator_to_lat(top + unit))
}

/// Returns `(lon_left, lon_right)` of tile column `x` at `zoom`.
#[inline]
pub fn tile_to_lon_edges(x: u32, zoom: u8) -> (f64, f64) {
    let unit = 360.0 / tiles_per_axis(zoom) as f64;
    let left = -180.0 + x as f64 * unit;
    (left, left + unit)
}

/// Geographic footprint of a tile.
pub fn tile_edges(tile: &TileIndex) -> GeoBoundingBox {
    let (lat_top, lat_bottom) = tile_to_lat_edges(tile.y, tile.z);
    let (lon_left, lon_right) = tile_to_lon_edges(tile.x, tile.z);
    GeoBoundingBox {
        lon_min: lon_left,
        lat_min: lat_bottom,
        lon_max: lon_right,
        lat_max: lat_top,
    }
}
