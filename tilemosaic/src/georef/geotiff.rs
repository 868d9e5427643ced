//! Minimal GeoTIFF encoding and header decoding for EPSG:4326 RGBA rasters.
//!
//! Only what the mosaic needs: 8-bit RGBA (or RGB on read), chunky layout,
//! georeferenced by ModelPixelScale + ModelTiepoint with a GeoKeyDirectory
//! declaring a geographic WGS 84 model, pixel-is-area.

use std::fmt;
use std::io::{Read, Seek, Write};
use std::str::FromStr;

use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::compression::{self as codec, CompressionAlgorithm};
use tiff::encoder::{DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, Tag};
use tiff::ColorType;

use crate::coord::GeoBoundingBox;

/// EPSG code of the only spatial reference written.
pub const EPSG_WGS84: u16 = 4326;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;

// GeoKey values
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Errors from GeoTIFF encoding or header decoding.
#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("missing or malformed GeoTIFF tag {0}")]
    MissingGeoTag(&'static str),

    #[error("unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Output compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Uncompressed strips
    None,
    /// LZW
    Lzw,
    /// Deflate (zlib)
    #[default]
    Deflate,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::None => CompressionMethod::None,
            Compression::Lzw => CompressionMethod::LZW,
            Compression::Deflate => CompressionMethod::Deflate,
        }
    }

    /// Encodes one strip into `out`, replacing its contents.
    fn encode_strip(self, strip: &[u8], out: &mut Vec<u8>) -> std::io::Result<()> {
        out.clear();
        match self {
            Compression::None => out.extend_from_slice(strip),
            Compression::Lzw => {
                codec::Lzw.write_to(out, strip)?;
            }
            Compression::Deflate => {
                codec::Deflate::with_level(DeflateLevel::Balanced).write_to(out, strip)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::None => "none",
            Compression::Lzw => "lzw",
            Compression::Deflate => "deflate",
        };
        f.write_str(name)
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Compression::None),
            "lzw" => Ok(Compression::Lzw),
            "deflate" | "zip" => Ok(Compression::Deflate),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

/// Raster dimensions and geographic footprint recovered from a GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRasterHeader {
    pub width: u32,
    pub height: u32,
    pub bounds: GeoBoundingBox,
}

impl GeoRasterHeader {
    /// Degrees per pixel along longitude.
    pub fn pixel_width(&self) -> f64 {
        self.bounds.width() / self.width as f64
    }

    /// Degrees per pixel along latitude.
    pub fn pixel_height(&self) -> f64 {
        self.bounds.height() / self.height as f64
    }
}

/// Writes an RGBA8 GeoTIFF strip by strip.
///
/// `fill` receives the first row of the strip, the number of rows and a
/// buffer it must fill with exactly `rows * width * 4` bytes. Each strip is
/// compressed on its own before it reaches `writer`, so only one strip is
/// held in memory at a time.
pub fn write_rgba_geotiff<W, F, E>(
    writer: W,
    width: u32,
    height: u32,
    bounds: &GeoBoundingBox,
    compression: Compression,
    rows_per_strip: u32,
    mut fill: F,
) -> Result<(), E>
where
    W: Write + Seek,
    F: FnMut(u32, u32, &mut Vec<u8>) -> Result<(), E>,
    E: From<GeoTiffError>,
{
    if width == 0 || height == 0 {
        return Err(GeoTiffError::UnsupportedLayout("raster has zero dimensions".to_string()).into());
    }
    let rows_per_strip = rows_per_strip.clamp(1, height);

    let mut encoder = TiffEncoder::new(writer).map_err(GeoTiffError::from)?;
    let mut dir = encoder.image_directory().map_err(GeoTiffError::from)?;

    write_image_tags(&mut dir, width, height, compression, rows_per_strip)?;
    write_geo_tags(&mut dir, width, height, bounds)?;

    let mut buffer = Vec::with_capacity(rows_per_strip as usize * width as usize * 4);
    let mut encoded = Vec::new();
    let mut offsets: Vec<u32> = Vec::new();
    let mut byte_counts: Vec<u32> = Vec::new();

    let mut row = 0;
    while row < height {
        let rows = rows_per_strip.min(height - row);
        buffer.clear();
        fill(row, rows, &mut buffer)?;

        let expected = rows as usize * width as usize * 4;
        if buffer.len() != expected {
            return Err(GeoTiffError::BufferSize {
                expected,
                actual: buffer.len(),
            }
            .into());
        }

        compression
            .encode_strip(&buffer, &mut encoded)
            .map_err(GeoTiffError::from)?;
        let offset = dir
            .write_data(encoded.as_slice())
            .map_err(GeoTiffError::from)?;

        offsets.push(classic_offset(offset)?);
        byte_counts.push(classic_offset(encoded.len() as u64)?);
        row += rows;
    }

    dir.write_tag(Tag::StripOffsets, offsets.as_slice())
        .map_err(GeoTiffError::from)?;
    dir.write_tag(Tag::StripByteCounts, byte_counts.as_slice())
        .map_err(GeoTiffError::from)?;
    dir.finish().map_err(GeoTiffError::from)?;
    Ok(())
}

/// Classic TIFF addresses strips with 32-bit offsets.
fn classic_offset(value: u64) -> Result<u32, GeoTiffError> {
    u32::try_from(value).map_err(|_| {
        GeoTiffError::UnsupportedLayout("output exceeds the 4 GiB classic TIFF limit".to_string())
    })
}

fn write_image_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    width: u32,
    height: u32,
    compression: Compression,
    rows_per_strip: u32,
) -> Result<(), GeoTiffError> {
    dir.write_tag(Tag::ImageWidth, width)?;
    dir.write_tag(Tag::ImageLength, height)?;
    dir.write_tag(Tag::BitsPerSample, &[8u16, 8, 8, 8][..])?;
    dir.write_tag(Tag::Compression, compression.method().to_u16())?;
    dir.write_tag(
        Tag::PhotometricInterpretation,
        PhotometricInterpretation::RGB.to_u16(),
    )?;
    dir.write_tag(Tag::SamplesPerPixel, 4u16)?;
    dir.write_tag(Tag::RowsPerStrip, rows_per_strip)?;
    dir.write_tag(Tag::PlanarConfiguration, PlanarConfiguration::Chunky.to_u16())?;
    // Unassociated alpha
    dir.write_tag(Tag::ExtraSamples, 2u16)?;
    dir.write_tag(Tag::SampleFormat, &[1u16, 1, 1, 1][..])?;
    Ok(())
}

/// Writes a whole RGBA8 raster held in memory.
pub fn write_rgba_image<W: Write + Seek>(
    writer: W,
    width: u32,
    height: u32,
    rgba: &[u8],
    bounds: &GeoBoundingBox,
    compression: Compression,
) -> Result<(), GeoTiffError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(GeoTiffError::BufferSize {
            expected,
            actual: rgba.len(),
        });
    }

    let row_bytes = width as usize * 4;
    write_rgba_geotiff(
        writer,
        width,
        height,
        bounds,
        compression,
        height,
        |first, rows, buffer: &mut Vec<u8>| {
            let start = first as usize * row_bytes;
            let end = start + rows as usize * row_bytes;
            buffer.extend_from_slice(&rgba[start..end]);
            Ok::<(), GeoTiffError>(())
        },
    )
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    width: u32,
    height: u32,
    bounds: &GeoBoundingBox,
) -> Result<(), GeoTiffError> {
    // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
    let pixel_scale = [
        bounds.width() / width as f64,
        bounds.height() / height as f64,
        0.0,
    ];
    dir.write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..])?;

    // ModelTiepoint: pixel (0, 0) at the north-west corner
    let tiepoint = [0.0, 0.0, 0.0, bounds.lon_min, bounds.lat_max, 0.0];
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let geokeys: [u16; 16] = [
        1, // KeyDirectoryVersion
        1, // KeyRevision
        0, // MinorRevision
        3, // NumberOfKeys
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        MODEL_TYPE_GEOGRAPHIC,
        GT_RASTER_TYPE_GEO_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        GEOGRAPHIC_TYPE_GEO_KEY,
        0,
        1,
        EPSG_WGS84,
    ];
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    Ok(())
}

/// Reads dimensions and geographic bounds without decoding pixel data.
pub fn read_header<R: Read + Seek>(reader: R) -> Result<GeoRasterHeader, GeoTiffError> {
    let mut decoder = Decoder::new(reader)?;
    header_from_decoder(&mut decoder)
}

fn header_from_decoder<R: Read + Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoRasterHeader, GeoTiffError> {
    let (width, height) = decoder.dimensions()?;
    if width == 0 || height == 0 {
        return Err(GeoTiffError::UnsupportedLayout(
            "raster has zero dimensions".to_string(),
        ));
    }

    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| GeoTiffError::MissingGeoTag("ModelPixelScale"))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| GeoTiffError::MissingGeoTag("ModelTiepoint"))?;

    if scale.len() < 2 || !(scale[0] > 0.0 && scale[1] > 0.0) {
        return Err(GeoTiffError::MissingGeoTag("ModelPixelScale"));
    }
    if tiepoint.len() < 6 {
        return Err(GeoTiffError::MissingGeoTag("ModelTiepoint"));
    }

    // Tiepoint maps raster (i, j) to model (x, y)
    let lon_min = tiepoint[3] - tiepoint[0] * scale[0];
    let lat_max = tiepoint[4] + tiepoint[1] * scale[1];

    Ok(GeoRasterHeader {
        width,
        height,
        bounds: GeoBoundingBox {
            lon_min,
            lat_min: lat_max - scale[1] * height as f64,
            lon_max: lon_min + scale[0] * width as f64,
            lat_max,
        },
    })
}

/// Decodes a GeoTIFF into its header and RGBA8 pixels.
///
/// RGB8 sources get an opaque alpha channel.
pub fn read_rgba<R: Read + Seek>(reader: R) -> Result<(GeoRasterHeader, Vec<u8>), GeoTiffError> {
    let mut decoder = Decoder::new(reader)?;
    let header = header_from_decoder(&mut decoder)?;
    let color = decoder.colortype()?;

    let data = match decoder.read_image()? {
        DecodingResult::U8(data) => data,
        _ => {
            return Err(GeoTiffError::UnsupportedLayout(format!(
                "{:?} is not 8-bit",
                color
            )))
        }
    };

    let rgba = match color {
        ColorType::RGBA(8) => data,
        ColorType::RGB(8) => data
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
            .collect(),
        other => {
            return Err(GeoTiffError::UnsupportedLayout(format!(
                "color type {:?}",
                other
            )))
        }
    };

    let expected = header.width as usize * header.height as usize * 4;
    if rgba.len() != expected {
        return Err(GeoTiffError::BufferSize {
            expected,
            actual: rgba.len(),
        });
    }

    Ok((header, rgba))
}
