//! Mosaic assembly.
//!
//! Georeferenced tiles are first indexed into a [`VirtualMosaic`] from their
//! GeoTIFF headers alone; [`VirtualMosaic::materialize`] then renders the
//! single output GeoTIFF strip by strip, decoding only the tiles that touch
//! the strip being written.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::GeoBoundingBox;
use crate::georef::{read_geotiff_header, read_rgba, write_rgba_geotiff, GeoRasterHeader, GeoTiffError};

pub use crate::georef::Compression;

/// Target size of one output strip in bytes.
const STRIP_BYTES_TARGET: usize = 8 * 1024 * 1024;

/// Upper bound on rows per strip.
const MAX_STRIP_ROWS: u32 = 256;

/// RGBA value of pixels no tile covers.
pub const NO_DATA: [u8; 4] = [0, 0, 0, 0];

/// Errors that prevent a mosaic from being produced.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no georeferenced tiles to assemble")]
    NoTiles,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GeoTIFF encoding failed: {0}")]
    Tiff(#[from] GeoTiffError),

    #[error("invalid source raster {}: {source}", .path.display())]
    InvalidSource {
        path: PathBuf,
        #[source]
        source: GeoTiffError,
    },
}

/// Summary of a written mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bounds: GeoBoundingBox,
    pub source_count: usize,
    pub compression: Compression,
}

#[derive(Debug, Clone)]
struct SourceRaster {
    path: PathBuf,
    header: GeoRasterHeader,
}

impl SourceRaster {
    fn covers_lat(&self, lat: f64) -> bool {
        lat > self.header.bounds.lat_min && lat <= self.header.bounds.lat_max
    }

    fn intersects_lat(&self, south: f64, north: f64) -> bool {
        self.header.bounds.lat_max > south && self.header.bounds.lat_min < north
    }

    /// Source pixel nearest to `(lon, lat)`, clamped into the raster.
    fn pixel_at(&self, lon: f64, lat: f64) -> (usize, usize) {
        let h = &self.header;
        let col = ((lon - h.bounds.lon_min) / h.pixel_width()).floor();
        let row = ((h.bounds.lat_max - lat) / h.pixel_height()).floor();
        let col = (col.max(0.0) as usize).min(h.width as usize - 1);
        let row = (row.max(0.0) as usize).min(h.height as usize - 1);
        (col, row)
    }
}

/// Header-only index over a set of georeferenced rasters.
#[derive(Debug, Clone)]
pub struct VirtualMosaic {
    sources: Vec<SourceRaster>,
    extent: GeoBoundingBox,
    pixel_width: f64,
    pixel_height: f64,
    width: u32,
    height: u32,
}

impl VirtualMosaic {
    /// Reads every source header and derives the output grid.
    ///
    /// The extent is the union of the source bounds and the resolution the
    /// mean of the source pixel sizes.
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Result<Self, AssemblyError> {
        let sources = read_sources(paths)?;
        let union = sources
            .iter()
            .skip(1)
            .fold(sources[0].header.bounds, |acc, s| acc.union(&s.header.bounds));
        Ok(Self::with_extent(sources, union))
    }

    /// Like [`build`](Self::build), but the output grid spans `footprint`
    /// whether or not a source reaches its edges. Areas no source covers
    /// are no-data.
    pub fn build_over<P: AsRef<Path>>(
        paths: &[P],
        footprint: &GeoBoundingBox,
    ) -> Result<Self, AssemblyError> {
        let sources = read_sources(paths)?;
        Ok(Self::with_extent(sources, *footprint))
    }

    fn with_extent(sources: Vec<SourceRaster>, area: GeoBoundingBox) -> Self {
        let count = sources.len() as f64;
        let pixel_width = sources.iter().map(|s| s.header.pixel_width()).sum::<f64>() / count;
        let pixel_height = sources.iter().map(|s| s.header.pixel_height()).sum::<f64>() / count;

        let width = ((area.width() / pixel_width).round() as u32).max(1);
        let height = ((area.height() / pixel_height).round() as u32).max(1);

        // Keep the north-west corner and the resolution; the far edges follow.
        let extent = GeoBoundingBox {
            lon_min: area.lon_min,
            lat_min: area.lat_max - height as f64 * pixel_height,
            lon_max: area.lon_min + width as f64 * pixel_width,
            lat_max: area.lat_max,
        };

        info!(
            sources = sources.len(),
            width,
            height,
            extent = %extent,
            "Virtual mosaic built"
        );

        Self {
            sources,
            extent,
            pixel_width,
            pixel_height,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> &GeoBoundingBox {
        &self.extent
    }

    /// Degrees per output pixel `(lon, lat)`.
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width, self.pixel_height)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Renders the mosaic to `output`.
    ///
    /// The file is written to a hidden `.partial` sibling and renamed into
    /// place on success; on failure nothing is left at either path.
    pub fn materialize(
        &self,
        output: &Path,
        compression: Compression,
    ) -> Result<MosaicInfo, AssemblyError> {
        let partial = partial_path(output);

        match self.write_to(&partial, compression) {
            Ok(()) => {}
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&partial) {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %partial.display(),
                            error = %remove_err,
                            "Failed to remove partial mosaic"
                        );
                    }
                }
                return Err(e);
            }
        }

        std::fs::rename(&partial, output).map_err(|source| {
            let _ = std::fs::remove_file(&partial);
            AssemblyError::Io {
                path: output.to_path_buf(),
                source,
            }
        })?;

        info!(
            path = %output.display(),
            width = self.width,
            height = self.height,
            compression = %compression,
            "Mosaic written"
        );

        Ok(MosaicInfo {
            path: output.to_path_buf(),
            width: self.width,
            height: self.height,
            bounds: self.extent,
            source_count: self.sources.len(),
            compression,
        })
    }

    fn write_to(&self, path: &Path, compression: Compression) -> Result<(), AssemblyError> {
        let io_err = |source| AssemblyError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        let row_bytes = self.width as usize * 4;
        let rows_per_strip = ((STRIP_BYTES_TARGET / row_bytes.max(1)) as u32).clamp(1, MAX_STRIP_ROWS);

        let mut loaded: HashMap<usize, Vec<u8>> = HashMap::new();

        write_rgba_geotiff(
            &mut writer,
            self.width,
            self.height,
            &self.extent,
            compression,
            rows_per_strip,
            |first_row, rows, buffer: &mut Vec<u8>| {
                self.render_strip(first_row, rows, &mut loaded, buffer)
            },
        )?;

        writer
            .into_inner()
            .map_err(|e| io_err(e.into_error()))?
            .sync_all()
            .map_err(io_err)?;
        Ok(())
    }

    fn row_lat(&self, row: u32) -> f64 {
        self.extent.lat_max - (row as f64 + 0.5) * self.pixel_height
    }

    fn col_lon(&self, col: u32) -> f64 {
        self.extent.lon_min + (col as f64 + 0.5) * self.pixel_width
    }

    /// Fills `buffer` with `rows` output rows starting at `first_row`.
    ///
    /// `loaded` caches decoded sources between strips; sources that no
    /// longer intersect are dropped since rows only move south.
    fn render_strip(
        &self,
        first_row: u32,
        rows: u32,
        loaded: &mut HashMap<usize, Vec<u8>>,
        buffer: &mut Vec<u8>,
    ) -> Result<(), AssemblyError> {
        let north = self.extent.lat_max - first_row as f64 * self.pixel_height;
        let south = self.extent.lat_max - (first_row + rows) as f64 * self.pixel_height;

        let strip_sources: Vec<usize> = (0..self.sources.len())
            .filter(|&i| self.sources[i].intersects_lat(south, north))
            .collect();

        loaded.retain(|i, _| strip_sources.contains(i));
        for &i in &strip_sources {
            if !loaded.contains_key(&i) {
                let source = &self.sources[i];
                let pixels = load_pixels(source)?;
                loaded.insert(i, pixels);
            }
        }

        debug!(
            first_row,
            rows,
            sources = strip_sources.len(),
            "Rendering mosaic strip"
        );

        for row in first_row..first_row + rows {
            let lat = self.row_lat(row);

            let mut row_sources: Vec<usize> = strip_sources
                .iter()
                .copied()
                .filter(|&i| self.sources[i].covers_lat(lat))
                .collect();
            row_sources.sort_by(|&a, &b| {
                self.sources[a]
                    .header
                    .bounds
                    .lon_min
                    .total_cmp(&self.sources[b].header.bounds.lon_min)
            });

            let mut cursor = 0;
            for col in 0..self.width {
                let lon = self.col_lon(col);

                while cursor < row_sources.len()
                    && self.sources[row_sources[cursor]].header.bounds.lon_max <= lon
                {
                    cursor += 1;
                }

                let hit = row_sources[cursor..]
                    .iter()
                    .take_while(|&&i| self.sources[i].header.bounds.lon_min <= lon)
                    .find(|&&i| lon < self.sources[i].header.bounds.lon_max)
                    .copied();

                match hit.and_then(|i| loaded.get(&i).map(|px| (i, px))) {
                    Some((i, pixels)) => {
                        let source = &self.sources[i];
                        let (sx, sy) = source.pixel_at(lon, lat);
                        let offset = (sy * source.header.width as usize + sx) * 4;
                        buffer.extend_from_slice(&pixels[offset..offset + 4]);
                    }
                    None => buffer.extend_from_slice(&NO_DATA),
                }
            }
        }

        Ok(())
    }
}

fn read_sources<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SourceRaster>, AssemblyError> {
    if paths.is_empty() {
        return Err(AssemblyError::NoTiles);
    }

    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let header = read_geotiff_header(path).map_err(|source| {
                AssemblyError::InvalidSource {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            Ok(SourceRaster {
                path: path.to_path_buf(),
                header,
            })
        })
        .collect()
}

fn load_pixels(source: &SourceRaster) -> Result<Vec<u8>, AssemblyError> {
    let invalid = |e: GeoTiffError| AssemblyError::InvalidSource {
        path: source.path.clone(),
        source: e,
    };
    let file = File::open(&source.path).map_err(|e| invalid(e.into()))?;
    let (header, pixels) = read_rgba(BufReader::new(file)).map_err(invalid)?;
    if header.width != source.header.width || header.height != source.header.height {
        return Err(invalid(GeoTiffError::UnsupportedLayout(
            "raster changed after indexing".to_string(),
        )));
    }
    Ok(pixels)
}

/// Hidden sibling used while the mosaic is being written.
pub fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mosaic.tif".to_string());
    output.with_file_name(format!(".{}.partial", name))
}

/// Builds the virtual mosaic and materializes it in one step.
pub fn assemble<P: AsRef<Path>>(
    tile_files: &[P],
    output: &Path,
    compression: Compression,
) -> Result<MosaicInfo, AssemblyError> {
    VirtualMosaic::build(tile_files)?.materialize(output, compression)
}

/// Assembles `tile_files` onto a grid spanning `footprint`, typically the
/// full planned tile range, so failed tiles on its edges stay as no-data.
pub fn assemble_over<P: AsRef<Path>>(
    tile_files: &[P],
    footprint: &GeoBoundingBox,
    output: &Path,
    compression: Compression,
) -> Result<MosaicInfo, AssemblyError> {
    VirtualMosaic::build_over(tile_files, footprint)?.materialize(output, compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileIndex;
    use crate::georef::{georeference, read_geotiff_header};
    use crate::provider::FetchedTile;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    const RED: [u8; 3] = [220, 20, 20];
    const BLUE: [u8; 3] = [20, 20, 220];

    fn georeferenced_tile(scratch: &Path, x: u32, y: u32, z: u8, colour: [u8; 3]) -> PathBuf {
        let index = TileIndex::new(x, y, z).unwrap();
        let raw = scratch.join(format!("{}.png", index.file_stem()));
        RgbImage::from_pixel(256, 256, Rgb(colour)).save(&raw).unwrap();
        let fetched = FetchedTile {
            index,
            image_path: raw,
            owned: true,
        };
        georeference(&fetched, scratch).unwrap().raster_path
    }

    fn pixel(rgba: &[u8], width: u32, col: u32, row: u32) -> [u8; 4] {
        let offset = (row as usize * width as usize + col as usize) * 4;
        [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]]
    }

    fn read_output(path: &Path) -> (GeoRasterHeader, Vec<u8>) {
        read_rgba(BufReader::new(File::open(path).unwrap())).unwrap()
    }

    #[test]
    fn test_adjacent_tiles_are_joined() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let tiles = vec![
            georeferenced_tile(scratch.path(), 0, 0, 1, RED),
            georeferenced_tile(scratch.path(), 1, 0, 1, BLUE),
        ];
        let output = out_dir.path().join("out.tif");

        let info = assemble(&tiles, &output, Compression::Deflate).unwrap();

        assert_eq!((info.width, info.height), (512, 256));
        assert_eq!(info.source_count, 2);
        assert!((info.bounds.lon_min + 180.0).abs() < 1e-9);
        assert!((info.bounds.lon_max - 180.0).abs() < 1e-9);

        let (header, rgba) = read_output(&output);
        assert_eq!((header.width, header.height), (512, 256));
        assert_eq!(pixel(&rgba, 512, 0, 0), [220, 20, 20, 255]);
        assert_eq!(pixel(&rgba, 512, 255, 128), [220, 20, 20, 255]);
        assert_eq!(pixel(&rgba, 512, 256, 128), [20, 20, 220, 255]);
        assert_eq!(pixel(&rgba, 512, 511, 255), [20, 20, 220, 255]);
    }

    #[test]
    fn test_missing_tile_leaves_transparent_gap() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        // Diagonal pair: the north-east and south-west quadrants are absent
        let tiles = vec![
            georeferenced_tile(scratch.path(), 0, 0, 1, RED),
            georeferenced_tile(scratch.path(), 1, 1, 1, BLUE),
        ];
        let output = out_dir.path().join("gap.tif");

        let info = assemble(&tiles, &output, Compression::Lzw).unwrap();
        assert_eq!((info.width, info.height), (512, 512));

        let (_, rgba) = read_output(&output);
        assert_eq!(pixel(&rgba, 512, 10, 10), [220, 20, 20, 255]);
        assert_eq!(pixel(&rgba, 512, 400, 10), NO_DATA, "north-east is no-data");
        assert_eq!(pixel(&rgba, 512, 10, 400), NO_DATA, "south-west is no-data");
        assert_eq!(pixel(&rgba, 512, 400, 400), [20, 20, 220, 255]);
    }

    #[test]
    fn test_failed_edge_tile_keeps_its_footprint() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        // Planned x 0..=1 at z1, only the western tile arrived
        let tiles = vec![georeferenced_tile(scratch.path(), 0, 0, 1, RED)];
        let west = crate::coord::tile_edges(&TileIndex::new(0, 0, 1).unwrap());
        let east = crate::coord::tile_edges(&TileIndex::new(1, 0, 1).unwrap());
        let footprint = west.union(&east);
        let output = out_dir.path().join("edge.tif");

        let info = assemble_over(&tiles, &footprint, &output, Compression::Deflate).unwrap();

        assert_eq!((info.width, info.height), (512, 256));
        assert!((info.bounds.lon_max - east.lon_max).abs() < 1e-9);
        assert!((info.bounds.lat_min - east.lat_min).abs() < 1e-9);

        let (header, rgba) = read_output(&output);
        assert_eq!((header.width, header.height), (512, 256));
        assert_eq!(pixel(&rgba, 512, 100, 100), [220, 20, 20, 255]);
        assert_eq!(pixel(&rgba, 512, 256, 0), NO_DATA);
        assert_eq!(pixel(&rgba, 512, 511, 255), NO_DATA);
    }

    #[test]
    fn test_output_carries_geotags() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let tiles = vec![georeferenced_tile(scratch.path(), 842, 388, 10, RED)];
        let output = out_dir.path().join("single.tif");

        let info = assemble(&tiles, &output, Compression::None).unwrap();
        let header = read_geotiff_header(&output).unwrap();
        let tile = read_geotiff_header(&tiles[0]).unwrap();

        assert_eq!((header.width, header.height), (256, 256));
        assert!((header.bounds.lon_min - tile.bounds.lon_min).abs() < 1e-9);
        assert!((header.bounds.lat_max - tile.bounds.lat_max).abs() < 1e-9);
        assert_eq!(info.bounds.lon_min, header.bounds.lon_min);
    }

    #[test]
    fn test_no_tiles_writes_nothing() {
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("out.tif");
        let empty: Vec<PathBuf> = Vec::new();

        let err = assemble(&empty, &output, Compression::Deflate).unwrap_err();
        assert!(matches!(err, AssemblyError::NoTiles));
        assert!(!output.exists());
    }

    #[test]
    fn test_invalid_source_is_rejected_without_output() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let bogus = scratch.path().join("plain.png");
        RgbImage::from_pixel(4, 4, Rgb(RED)).save(&bogus).unwrap();
        let output = out_dir.path().join("out.tif");

        let err = assemble(&[bogus], &output, Compression::Deflate).unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidSource { .. }));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_source_removed_before_materialize_leaves_no_partial() {
        let scratch = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let tiles = vec![georeferenced_tile(scratch.path(), 0, 0, 1, RED)];
        let output = out_dir.path().join("out.tif");

        let mosaic = VirtualMosaic::build(&tiles).unwrap();
        std::fs::remove_file(&tiles[0]).unwrap();

        assert!(mosaic.materialize(&output, Compression::Deflate).is_err());
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_resolution_is_mean_of_sources() {
        let scratch = TempDir::new().unwrap();
        let tiles = vec![
            georeferenced_tile(scratch.path(), 0, 0, 1, RED),
            georeferenced_tile(scratch.path(), 1, 0, 1, BLUE),
        ];
        let mosaic = VirtualMosaic::build(&tiles).unwrap();
        let (px_w, _) = mosaic.resolution();
        assert!((px_w - 180.0 / 256.0).abs() < 1e-12);
        assert_eq!(mosaic.source_count(), 2);
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("/data/out.tif")),
            PathBuf::from("/data/.out.tif.partial")
        );
    }
}
