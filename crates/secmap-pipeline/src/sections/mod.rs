//! Census-section geometry: shapefile loading, CRS handling, simplification
//!
//! Geometry is carried as `geo_types::MultiPolygon<f64>` and mutated in
//! place by reprojection and simplification; the dataset has a single owner
//! for the duration of the workflow.

use geo::Simplify;
use geo_types::{Coord, MultiPolygon};
use proj4rs::transform::transform;
use proj4rs::Proj;
use secmap_common::{Result, SecmapError};
use shapefile::dbase::FieldValue;
use std::path::Path;
use tracing::{debug, info};

/// Coordinate reference systems Spanish census bundles actually ship.
///
/// `.prj` sidecars are matched onto this fixed table rather than parsed as
/// general WKT; an unrecognized CRS is an error, not a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, the web-mapping standard
    Wgs84,
    /// EPSG:4258, ETRS89 geographic
    Etrs89,
    /// EPSG:25828-25831, ETRS89 / UTM zones 28N-31N
    Etrs89Utm(u8),
}

impl Crs {
    /// Parse the WKT contents of a `.prj` sidecar file.
    pub fn from_prj_wkt(wkt: &str) -> Result<Self> {
        let upper = wkt.to_uppercase();

        for zone in 28u8..=31 {
            if upper.contains(&format!("UTM_ZONE_{}N", zone))
                || upper.contains(&format!("UTM ZONE {}N", zone))
                || upper.contains(&format!("258{}", zone))
            {
                return Ok(Crs::Etrs89Utm(zone));
            }
        }

        if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84") {
            return Ok(Crs::Wgs84);
        }

        if upper.contains("ETRS_1989") || upper.contains("ETRS89") || upper.contains("4258") {
            return Ok(Crs::Etrs89);
        }

        Err(SecmapError::Projection(format!(
            "Unrecognized coordinate reference system: {}",
            wkt.chars().take(80).collect::<String>()
        )))
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Etrs89 => 4258,
            Crs::Etrs89Utm(zone) => 25800 + u32::from(*zone),
        }
    }

    /// Coordinates in degrees rather than meters
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84 | Crs::Etrs89)
    }

    fn proj_string(&self) -> String {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            // ETRS89 to WGS84 is a zero-shift datum hop
            Crs::Etrs89 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".to_string(),
            Crs::Etrs89Utm(zone) => format!(
                "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
                zone
            ),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// One census section read from the shapefile
#[derive(Debug, Clone)]
pub struct SectionShape {
    /// Census-section code (join key)
    pub cusec: String,

    /// Municipality name, when the bundle carries one
    pub municipality: Option<String>,

    pub geometry: MultiPolygon<f64>,
}

/// Read a census-section shapefile bundle and its `.prj` sidecar.
pub fn read_shapefile(path: &Path) -> Result<(Crs, Vec<SectionShape>)> {
    let crs = read_crs(path)?;

    let pairs = shapefile::read_as::<_, shapefile::Polygon, shapefile::dbase::Record>(path)
        .map_err(|e| SecmapError::Shapefile(format!("{}: {}", path.display(), e)))?;

    let mut shapes = Vec::with_capacity(pairs.len());
    for (polygon, record) in pairs {
        let cusec = match record.get("CUSEC") {
            Some(FieldValue::Character(Some(code))) => code.trim().to_string(),
            // Numeric storage cannot round-trip leading zeros; INE ships
            // CUSEC as a character field, this is a fallback only.
            Some(FieldValue::Numeric(Some(code))) => format!("{:.0}", code),
            _ => {
                return Err(SecmapError::Shapefile(format!(
                    "Record without a CUSEC attribute in {}",
                    path.display()
                )))
            }
        };

        let municipality = ["NMUN", "MUN_LITERAL"].iter().find_map(|name| {
            match record.get(name) {
                Some(FieldValue::Character(Some(value))) => Some(value.trim().to_string()),
                _ => None,
            }
        });

        let geometry: MultiPolygon<f64> = polygon
            .try_into()
            .map_err(|e| SecmapError::Geometry(format!("CUSEC {}: {:?}", cusec, e)))?;

        shapes.push(SectionShape {
            cusec,
            municipality,
            geometry,
        });
    }

    info!("Loaded {} sections from {} ({})", shapes.len(), path.display(), crs);

    Ok((crs, shapes))
}

fn read_crs(shp_path: &Path) -> Result<Crs> {
    let prj_path = shp_path.with_extension("prj");
    let wkt = std::fs::read_to_string(&prj_path).map_err(|_| {
        SecmapError::Projection(format!(
            "Missing .prj sidecar for {}; cannot determine the CRS",
            shp_path.display()
        ))
    })?;
    Crs::from_prj_wkt(&wkt)
}

/// Reproject every geometry to EPSG:4326 in place.
///
/// A no-op when the dataset is already in EPSG:4326. Must run before
/// simplification: the tolerance is expressed in degrees.
pub fn reproject_to_wgs84(crs: Crs, shapes: &mut [SectionShape]) -> Result<()> {
    if crs == Crs::Wgs84 {
        debug!("Dataset already in EPSG:4326, skipping reprojection");
        return Ok(());
    }

    info!("Reprojecting {} sections from {} to EPSG:4326", shapes.len(), crs);

    let src = Proj::from_proj_string(&crs.proj_string())
        .map_err(|e| SecmapError::Projection(e.to_string()))?;
    let dst = Proj::from_proj_string(&Crs::Wgs84.proj_string())
        .map_err(|e| SecmapError::Projection(e.to_string()))?;
    let src_geographic = crs.is_geographic();

    for shape in shapes.iter_mut() {
        let cusec = shape.cusec.clone();
        for_each_coord(&mut shape.geometry, &mut |coord| {
            // proj4rs works in radians for geographic CRS, meters otherwise
            let mut point = if src_geographic {
                (coord.x.to_radians(), coord.y.to_radians(), 0.0)
            } else {
                (coord.x, coord.y, 0.0)
            };
            transform(&src, &dst, &mut point).map_err(|e| {
                SecmapError::Projection(format!("CUSEC {}: {}", cusec, e))
            })?;
            coord.x = point.0.to_degrees();
            coord.y = point.1.to_degrees();
            Ok(())
        })?;
    }

    Ok(())
}

/// Simplify geometries in place with a Douglas-Peucker tolerance in degrees.
pub fn simplify_all<'a>(
    geometries: impl Iterator<Item = &'a mut MultiPolygon<f64>>,
    tolerance: f64,
) {
    for geometry in geometries {
        *geometry = geometry.simplify(&tolerance);
    }
}

fn for_each_coord<F>(geometry: &mut MultiPolygon<f64>, f: &mut F) -> Result<()>
where
    F: FnMut(&mut Coord<f64>) -> Result<()>,
{
    for polygon in geometry.0.iter_mut() {
        let mut failure = None;
        polygon.exterior_mut(|ring| {
            for coord in ring.0.iter_mut() {
                if let Err(e) = f(coord) {
                    failure = Some(e);
                    return;
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        polygon.interiors_mut(|rings| {
            for ring in rings {
                for coord in ring.0.iter_mut() {
                    if let Err(e) = f(coord) {
                        failure = Some(e);
                        return;
                    }
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }
    Ok(())
}

/// Summary of a shapefile bundle, for the `inspect` subcommand
#[derive(Debug)]
pub struct ShapefileSummary {
    pub rows: usize,
    pub crs: Crs,
    pub columns: Vec<String>,
    /// Candidate join columns (names containing CUSEC, COD, or ID) with
    /// their first few values
    pub join_candidates: Vec<(String, Vec<String>)>,
}

/// Describe a shapefile bundle: row count, CRS, columns, join candidates.
pub fn describe(path: &Path, sample: usize) -> Result<ShapefileSummary> {
    let crs = read_crs(path)?;

    let dbf_path = path.with_extension("dbf");
    let records = shapefile::dbase::read(&dbf_path)
        .map_err(|e| SecmapError::Shapefile(format!("{}: {}", dbf_path.display(), e)))?;

    let mut columns: Vec<String> = records
        .first()
        .map(|record| {
            record
                .clone()
                .into_iter()
                .map(|(name, _value)| name)
                .collect()
        })
        .unwrap_or_default();
    columns.sort();

    let mut join_candidates: Vec<(String, Vec<String>)> = columns
        .iter()
        .filter(|name| {
            let upper = name.to_uppercase();
            upper.contains("CUSEC") || upper.contains("COD") || upper.contains("ID")
        })
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for record in records.iter().take(sample) {
        for (name, values) in join_candidates.iter_mut() {
            values.push(render_field(record.get(name)));
        }
    }

    Ok(ShapefileSummary {
        rows: records.len(),
        crs,
        columns,
        join_candidates,
    })
}

fn render_field(value: Option<&FieldValue>) -> String {
    match value {
        Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
        Some(FieldValue::Numeric(Some(n))) => n.to_string(),
        Some(FieldValue::Float(Some(f))) => f.to_string(),
        Some(FieldValue::Integer(i)) => i.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    const ETRS89_UTM30_WKT: &str = r#"PROJCS["ETRS_1989_UTM_Zone_30N",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],UNIT["Meter",1.0]]"#;
    const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    #[test]
    fn test_crs_detection() {
        assert_eq!(Crs::from_prj_wkt(ETRS89_UTM30_WKT).unwrap(), Crs::Etrs89Utm(30));
        assert_eq!(Crs::from_prj_wkt(WGS84_WKT).unwrap(), Crs::Wgs84);
        assert_eq!(
            Crs::from_prj_wkt("GEOGCS[\"ETRS89\",...]").unwrap(),
            Crs::Etrs89
        );
        assert!(Crs::from_prj_wkt("PROJCS[\"Mars_2000\"]").is_err());
    }

    #[test]
    fn test_crs_epsg_codes() {
        assert_eq!(Crs::Wgs84.epsg(), 4326);
        assert_eq!(Crs::Etrs89.epsg(), 4258);
        assert_eq!(Crs::Etrs89Utm(30).epsg(), 25830);
        assert_eq!(Crs::Etrs89Utm(28).to_string(), "EPSG:25828");
    }

    #[test]
    fn test_reproject_wgs84_is_a_no_op() {
        let original = polygon![
            (x: -3.7, y: 40.4),
            (x: -3.6, y: 40.4),
            (x: -3.6, y: 40.5),
            (x: -3.7, y: 40.4),
        ];
        let mut shapes = vec![SectionShape {
            cusec: "2807901001".to_string(),
            municipality: Some("Madrid".to_string()),
            geometry: MultiPolygon(vec![original.clone()]),
        }];

        reproject_to_wgs84(Crs::Wgs84, &mut shapes).unwrap();

        let reprojected = &shapes[0].geometry.0[0];
        for (a, b) in original.exterior().0.iter().zip(reprojected.exterior().0.iter()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reproject_utm30_lands_near_madrid() {
        // EPSG:25830 coordinates of central Madrid
        let utm = polygon![
            (x: 440_000.0, y: 4_474_000.0),
            (x: 441_000.0, y: 4_474_000.0),
            (x: 441_000.0, y: 4_475_000.0),
            (x: 440_000.0, y: 4_474_000.0),
        ];
        let mut shapes = vec![SectionShape {
            cusec: "2807901001".to_string(),
            municipality: None,
            geometry: MultiPolygon(vec![utm]),
        }];

        reproject_to_wgs84(Crs::Etrs89Utm(30), &mut shapes).unwrap();

        let coord = shapes[0].geometry.0[0].exterior().0[0];
        assert!((coord.x - -3.7).abs() < 0.1, "lon was {}", coord.x);
        assert!((coord.y - 40.4).abs() < 0.1, "lat was {}", coord.y);
    }

    #[test]
    fn test_simplify_drops_redundant_points() {
        // Collinear midpoints on a square's edges disappear at any tolerance
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.5, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let mut geometries = vec![MultiPolygon(vec![square])];
        let before = geometries[0].0[0].exterior().0.len();

        simplify_all(geometries.iter_mut(), 0.0001);

        let after = geometries[0].0[0].exterior().0.len();
        assert!(after < before, "expected {} < {}", after, before);
        assert_eq!(geometries.len(), 1);
    }
}
