//! Tile georeferencing.
//!
//! Converts a fetched tile image into a GeoTIFF in the scratch directory
//! whose pixel grid covers exactly the tile's geographic footprint in
//! EPSG:4326. The image is re-tagged, never resampled.

mod geotiff;

pub use geotiff::{
    read_header, read_rgba, write_rgba_geotiff, write_rgba_image, Compression, GeoRasterHeader,
    GeoTiffError, EPSG_WGS84,
};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::coord::{tile_edges, GeoBoundingBox, TileIndex};
use crate::pipeline::TileError;
use crate::provider::FetchedTile;

/// A tile raster tagged with its geographic bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoreferencedTile {
    pub index: TileIndex,
    /// GeoTIFF in the scratch directory
    pub raster_path: PathBuf,
    /// Footprint, computed from the index alone
    pub bounds: GeoBoundingBox,
    /// EPSG code of `bounds`
    pub epsg: u16,
}

/// Writes `scratch/{x}_{y}_{z}.tif` for a fetched tile.
///
/// Scratch-owned source images are removed once the GeoTIFF is written;
/// local source files are never touched.
pub fn georeference(fetched: &FetchedTile, scratch: &Path) -> Result<GeoreferencedTile, TileError> {
    let index = fetched.index;
    let georef_err = |message: String| TileError::Georeference { index, message };

    let image = image::ImageReader::open(&fetched.image_path)
        .map_err(|source| TileError::Io { index, source })?
        .with_guessed_format()
        .map_err(|source| TileError::Io { index, source })?
        .decode()
        .map_err(|e| georef_err(format!("decode {}: {}", fetched.image_path.display(), e)))?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let bounds = tile_edges(&index);
    let raster_path = scratch.join(format!("{}.tif", index.file_stem()));

    write_tile(&raster_path, width, height, rgba.as_raw(), &bounds)
        .map_err(|e| georef_err(format!("write {}: {}", raster_path.display(), e)))?;

    trace!(
        x = index.x,
        y = index.y,
        z = index.z,
        width,
        height,
        bounds = %bounds,
        "Tile georeferenced"
    );

    if fetched.owned && fetched.image_path != raster_path {
        if let Err(e) = std::fs::remove_file(&fetched.image_path) {
            debug!(
                path = %fetched.image_path.display(),
                error = %e,
                "Could not remove raw tile download"
            );
        }
    }

    Ok(GeoreferencedTile {
        index,
        raster_path,
        bounds,
        epsg: EPSG_WGS84,
    })
}

fn write_tile(
    path: &Path,
    width: u32,
    height: u32,
    rgba: &[u8],
    bounds: &GeoBoundingBox,
) -> Result<(), GeoTiffError> {
    let mut writer = BufWriter::new(File::create(path)?);
    // Scratch tiles are always written uncompressed
    write_rgba_image(&mut writer, width, height, rgba, bounds, Compression::None)?;
    writer.flush()?;
    Ok(())
}

/// Reads the header of a GeoTIFF on disk.
pub fn read_geotiff_header(path: &Path) -> Result<GeoRasterHeader, GeoTiffError> {
    read_header(BufReader::new(File::open(path)?))
}
