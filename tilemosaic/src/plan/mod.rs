//! Tile range planning.
//!
//! Maps a geographic bounding box and zoom level onto the inclusive
//! rectangle of slippy-map tiles that covers it.

use std::fmt;

use crate::coord::{
    geo_to_tile_fraction, tile_to_lat_edges, tile_to_lon_edges, tiles_per_axis, CoordError,
    GeoBoundingBox, TileIndex,
};

/// Inclusive rectangle of tile indices at one zoom level.
///
/// Always non-empty: `x_min <= x_max` and `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
    zoom: u8,
}

impl TileRange {
    pub fn x_min(&self) -> u32 {
        self.x_min
    }

    pub fn x_max(&self) -> u32 {
        self.x_max
    }

    pub fn y_min(&self) -> u32 {
        self.y_min
    }

    pub fn y_max(&self) -> u32 {
        self.y_max
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of columns in the range.
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Number of rows in the range.
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if `tile` lies inside the range.
    pub fn contains(&self, tile: &TileIndex) -> bool {
        tile.z == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }

    /// Geographic footprint of the whole range, from the outer tile edges.
    pub fn bounds(&self) -> GeoBoundingBox {
        let (lat_max, _) = tile_to_lat_edges(self.y_min, self.zoom);
        let (_, lat_min) = tile_to_lat_edges(self.y_max, self.zoom);
        let (lon_min, _) = tile_to_lon_edges(self.x_min, self.zoom);
        let (_, lon_max) = tile_to_lon_edges(self.x_max, self.zoom);
        GeoBoundingBox {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }

    /// Iterates the tiles column by column (x outer, y inner).
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            current: 0,
        }
    }
}

impl IntoIterator for TileRange {
    type Item = TileIndex;
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x {}..={} y {}..={} z {}",
            self.x_min, self.x_max, self.y_min, self.y_max, self.zoom
        )
    }
}

/// Iterator over every tile of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    current: usize,
}

impl Iterator for TileRangeIter {
    type Item = TileIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.range.len() {
            return None;
        }

        let height = self.range.height() as usize;
        let x = self.range.x_min + (self.current / height) as u32;
        let y = self.range.y_min + (self.current % height) as u32;

        self.current += 1;

        Some(TileIndex {
            x,
            y,
            z: self.range.zoom,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.range.len() - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileRangeIter {}

/// Computes the tiles covering `bbox` at `zoom`.
///
/// The latitudes are clamped to the Mercator range first. The south-west
/// corner gives `x_min`/`y_max` and the north-east corner `x_max`/`y_min`;
/// both are floored, so an edge lying exactly on a tile boundary resolves
/// to the lower index.
pub fn plan_range(bbox: &GeoBoundingBox, zoom: u8) -> Result<TileRange, CoordError> {
    let bbox = bbox.clamped_to_mercator();
    let last = tiles_per_axis(zoom.min(crate::coord::MAX_ZOOM)) - 1;

    let (sw_x, sw_y) = geo_to_tile_fraction(bbox.lat_min, bbox.lon_min, zoom)?;
    let (ne_x, ne_y) = geo_to_tile_fraction(bbox.lat_max, bbox.lon_max, zoom)?;

    let to_index = |v: f64| (v.floor().max(0.0) as u32).min(last);

    let x_min = to_index(sw_x);
    let x_max = to_index(ne_x).max(x_min);
    let y_min = to_index(ne_y);
    let y_max = to_index(sw_y).max(y_min);

    Ok(TileRange {
        x_min,
        x_max,
        y_min,
        y_max,
        zoom,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> GeoBoundingBox {
        GeoBoundingBox::new(lon_min, lat_min, lon_max, lat_max).unwrap()
    }

    #[test]
    fn test_beijing_range_at_zoom_10() {
        let range = plan_range(&bbox(116.3, 39.9, 116.5, 40.0), 10).unwrap();
        assert_eq!((range.x_min(), range.x_max()), (842, 843));
        assert_eq!((range.y_min(), range.y_max()), (387, 388));
        assert_eq!(range.len(), 4);
        assert_eq!(range.iter().count(), range.len());
    }

    #[test]
    fn test_iteration_is_column_major() {
        let range = plan_range(&bbox(116.3, 39.9, 116.5, 40.0), 10).unwrap();
        let tiles: Vec<(u32, u32)> = range.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(tiles, vec![(842, 387), (842, 388), (843, 387), (843, 388)]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let b = bbox(-74.3, 40.4, -73.6, 41.0);
        assert_eq!(plan_range(&b, 12).unwrap(), plan_range(&b, 12).unwrap());
    }

    #[test]
    fn test_degenerate_bbox_yields_single_tile() {
        let range = plan_range(&bbox(116.3, 39.9, 116.3, 39.9), 10).unwrap();
        assert_eq!(range.len(), 1);
        let only = range.iter().next().unwrap();
        assert_eq!((only.x, only.y), (842, 388));
    }

    #[test]
    fn test_world_range_stays_inside_grid() {
        for zoom in [0u8, 1, 5, 12] {
            let range = plan_range(&bbox(-180.0, -90.0, 180.0, 90.0), zoom).unwrap();
            let n = tiles_per_axis(zoom);
            assert_eq!(range.x_min(), 0);
            assert_eq!(range.y_min(), 0);
            assert_eq!(range.x_max(), n - 1, "x_max at zoom {}", zoom);
            assert_eq!(range.y_max(), n - 1, "y_max at zoom {}", zoom);
            assert_eq!(range.len(), (n as usize) * (n as usize));
        }
    }

    #[test]
    fn test_boundary_edge_floors_to_lower_index() {
        // lon 0 is exactly the boundary between columns 1 and 2 at zoom 2
        let range = plan_range(&bbox(-10.0, 10.0, 0.0, 20.0), 2).unwrap();
        assert_eq!(range.x_min(), 1);
        assert_eq!(range.x_max(), 2);
    }

    #[test]
    fn test_invalid_zoom_is_rejected() {
        assert!(matches!(
            plan_range(&bbox(0.0, 0.0, 1.0, 1.0), 30),
            Err(CoordError::InvalidZoom(30))
        ));
    }

    #[test]
    fn test_bounds_span_corner_tiles() {
        let range = plan_range(&bbox(116.3, 39.9, 116.5, 40.0), 10).unwrap();
        let north_west = crate::coord::tile_edges(&TileIndex::new(842, 387, 10).unwrap());
        let south_east = crate::coord::tile_edges(&TileIndex::new(843, 388, 10).unwrap());

        let bounds = range.bounds();
        assert_eq!(bounds.lon_min, north_west.lon_min);
        assert_eq!(bounds.lat_max, north_west.lat_max);
        assert_eq!(bounds.lon_max, south_east.lon_max);
        assert_eq!(bounds.lat_min, south_east.lat_min);
    }

    #[test]
    fn test_contains_and_size_hint() {
        let range = plan_range(&bbox(116.3, 39.9, 116.5, 40.0), 10).unwrap();
        assert!(range.contains(&TileIndex::new(843, 388, 10).unwrap()));
        assert!(!range.contains(&TileIndex::new(844, 388, 10).unwrap()));
        let mut iter = range.iter();
        iter.next();
        assert_eq!(iter.len(), 3);
    }
}
