//! ESRI Shapefile boundary reader.

use std::path::Path;

use shapefile::{Shape, ShapeType};

use super::srs::SpatialRef;
use super::{BoundaryError, BoundaryLayer, Ring};

/// Reads the polygon shapes of a `.shp` file. The reference system comes
/// from the sibling `.prj`, which must exist.
pub(super) fn read(path: &Path) -> Result<BoundaryLayer, BoundaryError> {
    let prj = path.with_extension("prj");
    let wkt = match std::fs::read_to_string(&prj) {
        Ok(wkt) => wkt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BoundaryError::MissingProjection(prj))
        }
        Err(source) => return Err(BoundaryError::Io { path: prj, source }),
    };
    let srs = SpatialRef::from_wkt(&wkt)?;

    let shapes = shapefile::read_shapes(path).map_err(|e| BoundaryError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut polygons = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let rings: Vec<Ring> = match shape {
            Shape::NullShape => continue,
            Shape::Polygon(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| (p.x, p.y)).collect())
                .collect(),
            Shape::PolygonM(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| (p.x, p.y)).collect())
                .collect(),
            Shape::PolygonZ(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| (p.x, p.y)).collect())
                .collect(),
            other => {
                return Err(BoundaryError::UnsupportedGeometry {
                    path: path.to_path_buf(),
                    kind: shape_name(other.shapetype()),
                })
            }
        };
        polygons.push(rings);
    }

    Ok(BoundaryLayer {
        path: path.to_path_buf(),
        srs,
        polygons,
    })
}

fn shape_name(shape_type: ShapeType) -> String {
    format!("{:?}", shape_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::{Point, Polygon, PolygonRing, Polyline};
    use tempfile::TempDir;

    const ESRI_WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + size),
            Point::new(x0 + size, y0 + size),
            Point::new(x0 + size, y0),
            Point::new(x0, y0),
        ]))
    }

    fn write_polygons(dir: &Path, polygons: &[Polygon]) -> std::path::PathBuf {
        let path = dir.join("area.shp");
        shapefile::ShapeWriter::from_path(&path)
            .unwrap()
            .write_shapes(polygons)
            .unwrap();
        path
    }

    #[test]
    fn test_reads_polygons_and_prj() {
        let dir = TempDir::new().unwrap();
        let path = write_polygons(dir.path(), &[square(116.3, 39.9, 0.1), square(117.0, 40.0, 0.2)]);
        std::fs::write(path.with_extension("prj"), ESRI_WGS84).unwrap();

        let layer = read(&path).unwrap();
        assert_eq!(layer.srs.epsg(), 4326);
        assert_eq!(layer.polygons.len(), 2);
        assert_eq!(layer.polygons[0][0][0], (116.3, 39.9));
    }

    #[test]
    fn test_missing_prj() {
        let dir = TempDir::new().unwrap();
        let path = write_polygons(dir.path(), &[square(0.0, 0.0, 1.0)]);

        assert!(matches!(read(&path), Err(BoundaryError::MissingProjection(_))));
    }

    #[test]
    fn test_polyline_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roads.shp");
        let line = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        shapefile::ShapeWriter::from_path(&path)
            .unwrap()
            .write_shapes(&[line])
            .unwrap();
        std::fs::write(path.with_extension("prj"), ESRI_WGS84).unwrap();

        assert!(matches!(
            read(&path),
            Err(BoundaryError::UnsupportedGeometry { .. })
        ));
    }
}
