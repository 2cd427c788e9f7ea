//! Merge census-section geometry with the tabular CSV on the CUSEC code
//!
//! A left join: every geometry row is retained and sections without
//! tabular data carry absent attributes. Unmatched rows are counted and
//! reported, never treated as an error; downstream consumers decide
//! whether to fill, drop, or flag them.

use geojson::{Feature, FeatureCollection, GeoJson};
use geo_types::MultiPolygon;
use secmap_common::types::SectionRow;
use secmap_common::{Result, SecmapError};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::sections::{self, SectionShape};

/// GeoJSON property names, matching the CSV column spellings
const PROP_DWELLINGS: &str = "vivienda turistica";
const PROP_PLAZAS: &str = "plazas";
const PROP_DWELLINGS_PCT: &str = "Porcentaje vivienda turistica";

/// A census section with its joined tabular attributes, if any
#[derive(Debug, Clone)]
pub struct MergedSection {
    pub shape: SectionShape,
    pub attributes: Option<SectionRow>,
}

/// Read the tabular dataset, keeping CUSEC codes textual.
pub fn read_section_rows(path: &Path) -> Result<Vec<SectionRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| SecmapError::Csv(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<SectionRow>() {
        let mut row = result.map_err(|e| SecmapError::Csv(e.to_string()))?;
        row.cusec = row.cusec.trim().to_string();
        rows.push(row);
    }

    info!("Loaded {} tabular rows from {}", rows.len(), path.display());

    Ok(rows)
}

/// Left-join shapes with tabular rows on the CUSEC code.
///
/// Returns the merged sections (same count and order as the input shapes)
/// and the number of shapes with no matching tabular row.
pub fn left_join(shapes: Vec<SectionShape>, rows: Vec<SectionRow>) -> (Vec<MergedSection>, usize) {
    let index: HashMap<String, SectionRow> = rows
        .into_iter()
        .map(|row| (row.cusec.clone(), row))
        .collect();

    let mut unmatched = 0usize;
    let merged = shapes
        .into_iter()
        .map(|shape| {
            let attributes = index.get(shape.cusec.trim()).cloned();
            if attributes.is_none() {
                unmatched += 1;
            }
            MergedSection { shape, attributes }
        })
        .collect();

    (merged, unmatched)
}

/// Write the merged sections as a shapefile bundle.
///
/// dbase attribute names are capped at 10 characters, hence the
/// abbreviated numeric column names.
pub fn write_shapefile(path: &Path, sections: &[MergedSection]) -> Result<()> {
    let table = TableWriterBuilder::new()
        .add_character_field(field_name("CUSEC")?, 11)
        .add_character_field(field_name("NMUN")?, 60)
        .add_numeric_field(field_name("VIV_TUR")?, 12, 2)
        .add_numeric_field(field_name("PLAZAS")?, 12, 2)
        .add_numeric_field(field_name("PCT_VIVTUR")?, 12, 4);

    let mut writer = shapefile::Writer::from_path(path, table)
        .map_err(|e| SecmapError::Shapefile(format!("{}: {}", path.display(), e)))?;

    for section in sections {
        let mut record = Record::default();
        record.insert(
            "CUSEC".to_string(),
            FieldValue::Character(Some(section.shape.cusec.clone())),
        );
        record.insert(
            "NMUN".to_string(),
            FieldValue::Character(section.shape.municipality.clone()),
        );
        let attrs = section.attributes.as_ref();
        record.insert(
            "VIV_TUR".to_string(),
            FieldValue::Numeric(attrs.and_then(|a| a.tourist_dwellings)),
        );
        record.insert(
            "PLAZAS".to_string(),
            FieldValue::Numeric(attrs.and_then(|a| a.plazas)),
        );
        record.insert(
            "PCT_VIVTUR".to_string(),
            FieldValue::Numeric(attrs.and_then(|a| a.tourist_dwellings_pct)),
        );

        let polygon: shapefile::Polygon = section
            .shape
            .geometry
            .clone()
            .try_into()
            .map_err(|e| SecmapError::Geometry(format!("CUSEC {}: {:?}", section.shape.cusec, e)))?;
        writer
            .write_shape_and_record(&polygon, &record)
            .map_err(|e| {
                SecmapError::Shapefile(format!("CUSEC {}: {}", section.shape.cusec, e))
            })?;
    }

    info!("Wrote {} sections to {}", sections.len(), path.display());

    Ok(())
}

/// Write the merged sections as GeoJSON for web delivery.
///
/// Property names keep the original CSV spellings; unmatched sections get
/// explicit nulls so the attribute set is uniform across features.
pub fn write_geojson(path: &Path, sections: &[MergedSection]) -> Result<()> {
    let mut features = Vec::with_capacity(sections.len());
    for section in sections {
        let mut feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &section.shape.geometry,
            ))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        feature.set_property("CUSEC", section.shape.cusec.clone());
        feature.set_property("NMUN", section.shape.municipality.clone());
        let attrs = section.attributes.as_ref();
        feature.set_property(PROP_DWELLINGS, attrs.and_then(|a| a.tourist_dwellings));
        feature.set_property(PROP_PLAZAS, attrs.and_then(|a| a.plazas));
        feature.set_property(PROP_DWELLINGS_PCT, attrs.and_then(|a| a.tourist_dwellings_pct));
        features.push(feature);
    }

    let collection: FeatureCollection = features.into_iter().collect();
    std::fs::write(path, GeoJson::from(collection).to_string())?;

    info!("Wrote {} features to {}", sections.len(), path.display());

    Ok(())
}

/// Read a merged GeoJSON file back, e.g. for rendering.
pub fn read_geojson(path: &Path) -> Result<Vec<MergedSection>> {
    let contents = std::fs::read_to_string(path)?;
    let collection: FeatureCollection = contents
        .parse()
        .map_err(|e: geojson::Error| SecmapError::Geometry(e.to_string()))?;

    let mut sections = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| SecmapError::Geometry("Feature without geometry".to_string()))?;
        let geometry = match geo_types::Geometry::<f64>::try_from(geometry.value.clone()) {
            Ok(geo_types::Geometry::MultiPolygon(mp)) => mp,
            Ok(geo_types::Geometry::Polygon(p)) => MultiPolygon(vec![p]),
            Ok(other) => {
                return Err(SecmapError::Geometry(format!(
                    "Expected (multi)polygon, got {:?}",
                    std::mem::discriminant(&other)
                )))
            }
            Err(e) => return Err(SecmapError::Geometry(e.to_string())),
        };

        let cusec = feature
            .property("CUSEC")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SecmapError::Geometry("Feature without a CUSEC property".to_string()))?
            .to_string();
        let municipality = feature
            .property("NMUN")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let tourist_dwellings = feature.property(PROP_DWELLINGS).and_then(|v| v.as_f64());
        let plazas = feature.property(PROP_PLAZAS).and_then(|v| v.as_f64());
        let tourist_dwellings_pct = feature.property(PROP_DWELLINGS_PCT).and_then(|v| v.as_f64());
        // A feature with all-null attributes was an unmatched join
        let attributes = if tourist_dwellings.is_none() && plazas.is_none() && tourist_dwellings_pct.is_none() {
            None
        } else {
            Some(SectionRow {
                cusec: cusec.clone(),
                tourist_dwellings,
                plazas,
                tourist_dwellings_pct,
            })
        };

        sections.push(MergedSection {
            shape: SectionShape {
                cusec,
                municipality,
                geometry,
            },
            attributes,
        });
    }

    Ok(sections)
}

/// Inputs and knobs for the merge workflow
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub shapefile: PathBuf,
    pub csv: PathBuf,
    pub output_dir: PathBuf,
    /// Douglas-Peucker tolerance in degrees (0.0001 is roughly 11 m at
    /// the equator)
    pub tolerance: f64,
}

/// What the merge workflow produced
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub sections: usize,
    pub unmatched: usize,
    pub shapefile_out: PathBuf,
    pub geojson_out: PathBuf,
}

/// Run the merge workflow: load, reproject, join, simplify, persist.
///
/// Reprojection happens before simplification; the tolerance is only
/// meaningful in degrees.
pub fn run(options: &MergeOptions) -> Result<MergeReport> {
    let (crs, mut shapes) = sections::read_shapefile(&options.shapefile)?;
    sections::reproject_to_wgs84(crs, &mut shapes)?;

    let rows = read_section_rows(&options.csv)?;

    let (mut merged, unmatched) = left_join(shapes, rows);
    info!(
        "Merged {} sections, {} without matching tabular data",
        merged.len(),
        unmatched
    );

    sections::simplify_all(
        merged.iter_mut().map(|section| &mut section.shape.geometry),
        options.tolerance,
    );

    std::fs::create_dir_all(&options.output_dir)?;
    let shapefile_out = options.output_dir.join("secciones_with_shapes.shp");
    let geojson_out = options.output_dir.join("secciones_with_shapes.geojson");
    write_shapefile(&shapefile_out, &merged)?;
    write_geojson(&geojson_out, &merged)?;

    Ok(MergeReport {
        sections: merged.len(),
        unmatched,
        shapefile_out,
        geojson_out,
    })
}

fn field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|e| SecmapError::Shapefile(format!("{}: {:?}", name, e)))
}
