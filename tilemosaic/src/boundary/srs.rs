//! Spatial reference systems understood by the boundary resolver.

use std::fmt;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::BoundaryError;

pub const EPSG_WGS84: u32 = 4326;
pub const EPSG_NAD83: u32 = 4269;
pub const EPSG_CGCS2000: u32 = 4490;
pub const EPSG_WEB_MERCATOR: u32 = 3857;
/// Legacy alias of EPSG:3857
pub const EPSG_GOOGLE: u32 = 900913;

const WEB_MERCATOR_PROJ: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// A coordinate reference system identified by EPSG code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialRef {
    epsg: u32,
    proj: String,
    geographic: bool,
}

impl SpatialRef {
    /// WGS 84 longitude/latitude, the mosaic's reference system.
    pub fn wgs84() -> Self {
        Self {
            epsg: EPSG_WGS84,
            proj: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            geographic: true,
        }
    }

    /// Looks up a supported EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, BoundaryError> {
        let (proj, geographic) = match code {
            EPSG_WGS84 => return Ok(Self::wgs84()),
            EPSG_NAD83 => ("+proj=longlat +ellps=GRS80 +towgs84=0,0,0 +no_defs".to_string(), true),
            EPSG_CGCS2000 => ("+proj=longlat +ellps=GRS80 +no_defs".to_string(), true),
            EPSG_WEB_MERCATOR | EPSG_GOOGLE => (WEB_MERCATOR_PROJ.to_string(), false),
            32601..=32660 => (
                format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600),
                false,
            ),
            32701..=32760 => (
                format!(
                    "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
                    code - 32700
                ),
                false,
            ),
            _ => return Err(BoundaryError::UnsupportedSrs(code)),
        };

        Ok(Self {
            epsg: if code == EPSG_GOOGLE { EPSG_WEB_MERCATOR } else { code },
            proj,
            geographic,
        })
    }

    /// Identifies the reference system described by a WKT string, as found
    /// in a shapefile's `.prj`.
    ///
    /// The root `AUTHORITY["EPSG",n]` (or WKT2 `ID["EPSG",n]`) wins; ESRI
    /// style WKT without an authority is matched on the root name.
    pub fn from_wkt(wkt: &str) -> Result<Self, BoundaryError> {
        let wkt = wkt.trim();
        if let Some(code) = root_authority(wkt) {
            return Self::from_epsg(code);
        }

        let keyword = wkt
            .split('[')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();
        let name = root_name(wkt)
            .map(normalize_name)
            .ok_or_else(|| BoundaryError::UnknownSrs(abbreviate(wkt)))?;

        let geographic = matches!(keyword.as_str(), "GEOGCS" | "GEOGCRS" | "GEODCRS");
        let is_wgs84 = name.contains("wgs_1984") || name.contains("wgs_84") || name.contains("wgs84");

        let code = if name.contains("web_mercator")
            || name.contains("pseudo_mercator")
            || name.contains("popular_visualisation")
        {
            Some(EPSG_WEB_MERCATOR)
        } else if let Some((zone, north)) = utm_zone(&name) {
            is_wgs84.then(|| if north { 32600 + zone } else { 32700 + zone })
        } else if !geographic {
            None
        } else if name.contains("cgcs2000") || name.contains("china_geodetic_coordinate_system_2000") {
            Some(EPSG_CGCS2000)
        } else if name.contains("nad83") || name.contains("north_american_1983") {
            Some(EPSG_NAD83)
        } else if is_wgs84 {
            Some(EPSG_WGS84)
        } else {
            None
        };

        match code {
            Some(code) => Self::from_epsg(code),
            None => Err(BoundaryError::UnknownSrs(abbreviate(wkt))),
        }
    }

    /// Parses a GeoJSON `crs` name: `EPSG:n`, `urn:ogc:def:crs:EPSG::n`
    /// or the CRS84 aliases.
    pub fn from_crs_name(name: &str) -> Result<Self, BoundaryError> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Self::wgs84());
        }
        if upper.contains("EPSG") {
            if let Some(code) = upper.rsplit(':').next().and_then(|c| c.parse().ok()) {
                return Self::from_epsg(code);
            }
        }
        Err(BoundaryError::UnknownSrs(name.to_string()))
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn proj_string(&self) -> &str {
        &self.proj
    }

    /// True for longitude/latitude systems (degrees).
    pub fn is_geographic(&self) -> bool {
        self.geographic
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Point transformer between two [`SpatialRef`]s.
pub(crate) struct Reprojector {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
    identity: bool,
}

impl Reprojector {
    pub(crate) fn new(source: &SpatialRef, target: &SpatialRef) -> Result<Self, BoundaryError> {
        let build = |srs: &SpatialRef| {
            Proj::from_proj_string(srs.proj_string())
                .map_err(|e| BoundaryError::Reprojection(format!("invalid projection {}: {:?}", srs, e)))
        };

        Ok(Self {
            source: build(source)?,
            target: build(target)?,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
            identity: source.epsg() == target.epsg(),
        })
    }

    /// Transforms one `(x, y)` pair; geographic coordinates are in degrees.
    pub(crate) fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), BoundaryError> {
        if self.identity {
            return Ok((x, y));
        }

        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.source, &self.target, &mut point).map_err(|e| {
            BoundaryError::Reprojection(format!("point ({}, {}): {:?}", x, y, e))
        })?;

        let out = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if out.0.is_finite() && out.1.is_finite() {
            Ok(out)
        } else {
            Err(BoundaryError::Reprojection(format!(
                "point ({}, {}) has no finite image",
                x, y
            )))
        }
    }
}

/// EPSG code of the authority clause directly under the WKT root.
fn root_authority(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut found = None;

    for (i, ch) in upper.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '[' | '(' => {
                depth += 1;
                if depth == 2 {
                    let head = upper[..i].trim_end();
                    let keyword_start = head
                        .rfind(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                        .map_or(0, |p| p + 1);
                    let keyword = &head[keyword_start..];
                    if keyword == "AUTHORITY" || keyword == "ID" {
                        found = parse_epsg_clause(&upper[i + 1..]);
                    }
                }
            }
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    found
}

/// Parses `"EPSG","3857"]` or `"EPSG",3857]`.
fn parse_epsg_clause(rest: &str) -> Option<u32> {
    let end = rest.find([']', ')'])?;
    let mut parts = rest[..end].split(',').map(|p| p.trim().trim_matches('"'));
    if parts.next()? != "EPSG" {
        return None;
    }
    parts.next()?.parse().ok()
}

/// First quoted string of the WKT, the name of the root element.
fn root_name(wkt: &str) -> Option<&str> {
    let start = wkt.find('"')? + 1;
    let len = wkt[start..].find('"')?;
    Some(&wkt[start..start + len])
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// `utm_zone_50n` / `utm_zone_33s` -> (zone, north).
fn utm_zone(name: &str) -> Option<(u32, bool)> {
    let rest = &name[name.find("utm_zone_")? + "utm_zone_".len()..];
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let zone: u32 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    match rest[digits.len()..].chars().next() {
        Some('n') | None | Some('_') => Some((zone, true)),
        Some('s') => Some((zone, false)),
        _ => None,
    }
}

fn abbreviate(wkt: &str) -> String {
    const MAX: usize = 80;
    match wkt.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &wkt[..i]),
        None => wkt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESRI_WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
    const ESRI_WEB_MERCATOR: &str = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],UNIT["Meter",1.0]]"#;
    const OGC_UTM_50N: &str = r#"PROJCS["WGS 84 / UTM zone 50N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","32650"]]"#;

    #[test]
    fn test_supported_codes() {
        for code in [4326, 4269, 4490, 3857, 32601, 32660, 32701, 32760] {
            assert_eq!(SpatialRef::from_epsg(code).unwrap().epsg(), code);
        }
        assert_eq!(SpatialRef::from_epsg(900913).unwrap().epsg(), 3857);
    }

    #[test]
    fn test_unsupported_code() {
        assert!(matches!(
            SpatialRef::from_epsg(2154),
            Err(BoundaryError::UnsupportedSrs(2154))
        ));
        assert!(SpatialRef::from_epsg(32661).is_err());
    }

    #[test]
    fn test_geographic_flag() {
        assert!(SpatialRef::wgs84().is_geographic());
        assert!(SpatialRef::from_epsg(4490).unwrap().is_geographic());
        assert!(!SpatialRef::from_epsg(3857).unwrap().is_geographic());
        assert!(!SpatialRef::from_epsg(32650).unwrap().is_geographic());
    }

    #[test]
    fn test_wkt_root_authority_wins() {
        // Nested AUTHORITY["EPSG","4326"] belongs to the GEOGCS, not the root
        assert_eq!(SpatialRef::from_wkt(OGC_UTM_50N).unwrap().epsg(), 32650);
    }

    #[test]
    fn test_esri_wkt_names() {
        assert_eq!(SpatialRef::from_wkt(ESRI_WGS84).unwrap().epsg(), 4326);
        assert_eq!(SpatialRef::from_wkt(ESRI_WEB_MERCATOR).unwrap().epsg(), 3857);

        let cgcs = r#"GEOGCS["GCS_China_Geodetic_Coordinate_System_2000",DATUM["D_China_2000",SPHEROID["CGCS2000",6378137.0,298.257222101]]]"#;
        assert_eq!(SpatialRef::from_wkt(cgcs).unwrap().epsg(), 4490);

        let utm = r#"PROJCS["WGS_1984_UTM_Zone_33S",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(SpatialRef::from_wkt(utm).unwrap().epsg(), 32733);
    }

    #[test]
    fn test_unknown_wkt() {
        let lambert = r#"PROJCS["RGF93_Lambert_93",GEOGCS["GCS_RGF_1993"]]"#;
        assert!(matches!(
            SpatialRef::from_wkt(lambert),
            Err(BoundaryError::UnknownSrs(_))
        ));
        assert!(SpatialRef::from_wkt("").is_err());
    }

    #[test]
    fn test_crs_names() {
        assert_eq!(SpatialRef::from_crs_name("EPSG:3857").unwrap().epsg(), 3857);
        assert_eq!(
            SpatialRef::from_crs_name("urn:ogc:def:crs:EPSG::3857").unwrap().epsg(),
            3857
        );
        assert_eq!(
            SpatialRef::from_crs_name("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap().epsg(),
            4326
        );
        assert!(SpatialRef::from_crs_name("local").is_err());
    }

    #[test]
    fn test_mercator_to_wgs84() {
        let reprojector =
            Reprojector::new(&SpatialRef::from_epsg(3857).unwrap(), &SpatialRef::wgs84()).unwrap();
        let r = 6_378_137.0_f64;
        let x = 116.3_f64.to_radians() * r;
        let y = r * 39.9_f64.to_radians().tan().asinh();

        let (lon, lat) = reprojector.transform(x, y).unwrap();
        assert!((lon - 116.3).abs() < 1e-6, "lon {}", lon);
        assert!((lat - 39.9).abs() < 1e-6, "lat {}", lat);
    }

    #[test]
    fn test_utm_round_trip_stays_close() {
        let utm = SpatialRef::from_epsg(32650).unwrap();
        let forward = Reprojector::new(&SpatialRef::wgs84(), &utm).unwrap();
        let back = Reprojector::new(&utm, &SpatialRef::wgs84()).unwrap();

        let (e, n) = forward.transform(117.0, 40.0).unwrap();
        // Central meridian of zone 50 is 117E
        assert!((e - 500_000.0).abs() < 1e-3);
        let (lon, lat) = back.transform(e, n).unwrap();
        assert!((lon - 117.0).abs() < 1e-7);
        assert!((lat - 40.0).abs() < 1e-7);
    }

    #[test]
    fn test_identity() {
        let wgs = SpatialRef::wgs84();
        let reprojector = Reprojector::new(&wgs, &wgs).unwrap();
        assert_eq!(reprojector.transform(1.5, -2.5).unwrap(), (1.5, -2.5));
    }
}
