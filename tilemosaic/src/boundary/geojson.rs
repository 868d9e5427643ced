//! GeoJSON boundary reader and writer.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use super::srs::SpatialRef;
use super::{BoundaryError, BoundaryLayer, Ring};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    geometry: Option<Geometry>,
}

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
    Point {},
    MultiPoint {},
    LineString {},
    MultiLineString {},
}

#[derive(Debug, Deserialize)]
struct Crs {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

/// Reads the polygons of a GeoJSON document.
///
/// The native reference system comes from the legacy `crs` member and
/// defaults to WGS 84.
pub(super) fn read(path: &Path) -> Result<BoundaryLayer, BoundaryError> {
    let text = std::fs::read_to_string(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &text)
}

pub(super) fn parse(path: &Path, text: &str) -> Result<BoundaryLayer, BoundaryError> {
    let parse_err = |e: serde_json::Error| BoundaryError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut document: Value = serde_json::from_str(text).map_err(parse_err)?;

    let srs = match document.get_mut("crs").map(Value::take) {
        Some(Value::Null) | None => SpatialRef::wgs84(),
        Some(crs) => {
            let crs: Crs = serde_json::from_value(crs).map_err(parse_err)?;
            SpatialRef::from_crs_name(&crs.properties.name)?
        }
    };

    let geometries = match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => serde_json::from_value::<FeatureCollection>(document)
            .map_err(parse_err)?
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
        Some("Feature") => serde_json::from_value::<Feature>(document)
            .map_err(parse_err)?
            .geometry
            .into_iter()
            .collect(),
        _ => vec![serde_json::from_value::<Geometry>(document).map_err(parse_err)?],
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygons(path, geometry, &mut polygons)?;
    }

    Ok(BoundaryLayer {
        path: path.to_path_buf(),
        srs,
        polygons,
    })
}

fn collect_polygons(
    path: &Path,
    geometry: Geometry,
    out: &mut Vec<Vec<Ring>>,
) -> Result<(), BoundaryError> {
    let unsupported = |kind: &str| BoundaryError::UnsupportedGeometry {
        path: path.to_path_buf(),
        kind: kind.to_string(),
    };

    match geometry {
        Geometry::Polygon { coordinates } => out.push(rings(path, coordinates)?),
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                out.push(rings(path, polygon)?);
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for geometry in geometries {
                collect_polygons(path, geometry, out)?;
            }
        }
        Geometry::Point {} => return Err(unsupported("Point")),
        Geometry::MultiPoint {} => return Err(unsupported("MultiPoint")),
        Geometry::LineString {} => return Err(unsupported("LineString")),
        Geometry::MultiLineString {} => return Err(unsupported("MultiLineString")),
    }
    Ok(())
}

fn rings(path: &Path, coordinates: Vec<Vec<Position>>) -> Result<Vec<Ring>, BoundaryError> {
    coordinates
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|position| match position.as_slice() {
                    [x, y, ..] => Ok((*x, *y)),
                    _ => Err(BoundaryError::Parse {
                        path: path.to_path_buf(),
                        message: format!("position with {} coordinate(s)", position.len()),
                    }),
                })
                .collect()
        })
        .collect()
}

/// Serializes a layer as a GeoJSON `FeatureCollection` with one
/// `MultiPolygon` feature.
pub(super) fn to_string(layer: &BoundaryLayer) -> Result<String, serde_json::Error> {
    let coordinates: Vec<Vec<Vec<[f64; 2]>>> = layer
        .polygons
        .iter()
        .map(|polygon| {
            polygon
                .iter()
                .map(|ring| ring.iter().map(|&(x, y)| [x, y]).collect())
                .collect()
        })
        .collect();

    let mut document = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "MultiPolygon", "coordinates": coordinates },
        }],
    });

    if layer.srs.epsg() != super::srs::EPSG_WGS84 {
        document["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", layer.srs.epsg()) },
        });
    }

    serde_json::to_string_pretty(&document)
}
