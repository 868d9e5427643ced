//! Boundary extent resolution.
//!
//! Derives the geographic bounding box of a polygon file so that a run can
//! be driven by a boundary instead of manual coordinates:
//!
//! - GeoJSON (`.geojson`, `.json`), reference system from the `crs` member
//! - ESRI Shapefile (`.shp`), reference system from the sibling `.prj`
//!
//! Every vertex is reprojected into the target reference system before the
//! extent is taken.

mod geojson;
mod shp;
mod srs;

pub use srs::{SpatialRef, EPSG_CGCS2000, EPSG_NAD83, EPSG_WEB_MERCATOR, EPSG_WGS84};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{CoordError, GeoBoundingBox};
use srs::Reprojector;

/// Errors resolving a boundary file into an extent.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported boundary format: {} (expected .geojson, .json or .shp)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// No features or shapes carrying vertices
    #[error("boundary file {} contains no polygons", .0.display())]
    Empty(PathBuf),

    #[error("unsupported geometry {kind} in {}; only polygons are accepted", .path.display())]
    UnsupportedGeometry { path: PathBuf, kind: String },

    #[error("missing projection file {}", .0.display())]
    MissingProjection(PathBuf),

    #[error("unrecognised spatial reference: {0}")]
    UnknownSrs(String),

    #[error("unsupported spatial reference EPSG:{0}")]
    UnsupportedSrs(u32),

    #[error("reprojection failed: {0}")]
    Reprojection(String),

    /// Reprojected extent is not a valid geographic box
    #[error("invalid boundary extent: {0}")]
    Extent(#[from] CoordError),
}

/// A polygon ring as `(x, y)` pairs in the layer's reference system.
pub(crate) type Ring = Vec<(f64, f64)>;

/// Polygons read from a boundary file.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayer {
    /// File the layer was read from
    path: PathBuf,
    srs: SpatialRef,
    /// polygon -> ring -> vertex
    polygons: Vec<Vec<Ring>>,
}

impl BoundaryLayer {
    /// Reads a boundary file, choosing the reader from the extension.
    pub fn read(path: &Path) -> Result<Self, BoundaryError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let layer = match extension.as_deref() {
            Some("geojson") | Some("json") => geojson::read(path)?,
            Some("shp") => shp::read(path)?,
            _ => return Err(BoundaryError::UnsupportedFormat(path.to_path_buf())),
        };

        if layer.vertex_count() == 0 {
            return Err(BoundaryError::Empty(path.to_path_buf()));
        }

        debug!(
            path = %path.display(),
            srs = %layer.srs,
            polygons = layer.polygons.len(),
            vertices = layer.vertex_count(),
            "Boundary loaded"
        );
        Ok(layer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn srs(&self) -> &SpatialRef {
        &self.srs
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().count()
    }

    fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.polygons.iter().flatten().flatten().copied()
    }

    /// Returns the layer with every vertex transformed into `target`.
    pub fn reproject(&self, target: &SpatialRef) -> Result<Self, BoundaryError> {
        let reprojector = Reprojector::new(&self.srs, target)?;

        let polygons = self
            .polygons
            .iter()
            .map(|polygon| {
                polygon
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|&(x, y)| reprojector.transform(x, y))
                            .collect::<Result<Ring, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            path: self.path.clone(),
            srs: target.clone(),
            polygons,
        })
    }

    /// Bounding box of all vertices. Only meaningful for geographic layers.
    pub fn extent(&self) -> Result<GeoBoundingBox, BoundaryError> {
        let raw = GeoBoundingBox::from_points(self.vertices())
            .ok_or_else(|| BoundaryError::Empty(self.path.clone()))?;
        Ok(GeoBoundingBox::new(
            raw.lon_min,
            raw.lat_min,
            raw.lon_max,
            raw.lat_max,
        )?)
    }

    /// Writes the layer as `<stem>.epsg<code>.geojson` in `dir`.
    pub fn write_geojson(&self, dir: &Path) -> Result<PathBuf, BoundaryError> {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("boundary");
        let path = dir.join(format!("{}.epsg{}.geojson", stem, self.srs.epsg()));

        let text = geojson::to_string(self).map_err(|e| BoundaryError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, text).map_err(|source| BoundaryError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Reads `path` and returns the extent of its vertices after reprojection
/// into `target`.
pub fn resolve_extent(path: &Path, target: &SpatialRef) -> Result<GeoBoundingBox, BoundaryError> {
    BoundaryLayer::read(path)?.reproject(target)?.extent()
}

/// Where the run extent comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtentSource {
    /// Manual coordinates
    BoundingBox(GeoBoundingBox),
    /// Polygon file resolved through [`resolve_extent`]
    Boundary { path: PathBuf },
}

impl ExtentSource {
    /// Produces the EPSG:4326 bounding box of the source.
    ///
    /// With `persist_dir` set, a boundary's reprojected geometry is also
    /// written there as GeoJSON. That write is best-effort: a failure is
    /// logged and does not affect the result.
    pub fn resolve(&self, persist_dir: Option<&Path>) -> Result<GeoBoundingBox, BoundaryError> {
        let path = match self {
            ExtentSource::BoundingBox(bbox) => return Ok(*bbox),
            ExtentSource::Boundary { path } => path,
        };

        let layer = BoundaryLayer::read(path)?;
        let reprojected = layer.reproject(&SpatialRef::wgs84())?;
        let extent = reprojected.extent()?;

        info!(
            path = %path.display(),
            srs = %layer.srs(),
            extent = %extent,
            "Boundary extent resolved"
        );

        if let Some(dir) = persist_dir {
            match reprojected.write_geojson(dir) {
                Ok(written) => debug!(path = %written.display(), "Reprojected boundary saved"),
                Err(e) => warn!(error = %e, "Could not save reprojected boundary"),
            }
        }

        Ok(extent)
    }
}

impl fmt::Display for ExtentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtentSource::BoundingBox(bbox) => write!(f, "bbox {}", bbox),
            ExtentSource::Boundary { path } => write!(f, "boundary {}", path.display()),
        }
    }
}
