//! Static choropleth rendering and summary statistics
//!
//! Mirrors what the web map shows: sections filled by tourist dwelling
//! count on fixed bins, unmatched sections in neutral gray.

use plotters::prelude::*;
use secmap_common::{Result, SecmapError};
use std::path::Path;
use tracing::info;

use crate::merge::MergedSection;

/// Bin edges for the choropleth fill
const BINS: [f64; 5] = [1.0, 5.0, 10.0, 50.0, 100.0];

/// Orange-red ramp, light to dark, one color per bin plus the overflow
const RAMP: [RGBColor; 6] = [
    RGBColor(254, 240, 217),
    RGBColor(253, 212, 158),
    RGBColor(253, 187, 132),
    RGBColor(252, 141, 89),
    RGBColor(227, 74, 51),
    RGBColor(179, 0, 0),
];

/// Fill for sections without tabular data
const UNMATCHED: RGBColor = RGBColor(200, 200, 200);

/// Draw the merged sections as a PNG choropleth.
pub fn choropleth(
    sections: &[MergedSection],
    output: &Path,
    width: u32,
    height: u32,
) -> Result<()> {
    let (min_x, min_y, max_x, max_y) = bounds(sections)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(output, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(to_render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)
        .map_err(to_render_error)?;

    for section in sections {
        let value = section
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.tourist_dwellings);
        let color = fill_color(value);

        for polygon in &section.shape.geometry.0 {
            let points: Vec<(f64, f64)> = polygon
                .exterior()
                .0
                .iter()
                .map(|coord| (coord.x, coord.y))
                .collect();
            chart
                .draw_series(std::iter::once(Polygon::new(points, color.filled())))
                .map_err(to_render_error)?;
        }
    }

    root.present().map_err(to_render_error)?;

    info!(
        "Rendered {} sections to {} ({}x{})",
        sections.len(),
        output.display(),
        width,
        height
    );

    Ok(())
}

fn fill_color(value: Option<f64>) -> RGBColor {
    let value = match value {
        Some(v) => v,
        None => return UNMATCHED,
    };
    let bin = BINS.iter().position(|edge| value < *edge).unwrap_or(BINS.len());
    RAMP[bin]
}

fn bounds(sections: &[MergedSection]) -> Result<(f64, f64, f64, f64)> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for section in sections {
        for polygon in &section.shape.geometry.0 {
            for coord in &polygon.exterior().0 {
                min_x = min_x.min(coord.x);
                min_y = min_y.min(coord.y);
                max_x = max_x.max(coord.x);
                max_y = max_y.max(coord.y);
            }
        }
    }

    if min_x >= max_x || min_y >= max_y {
        return Err(SecmapError::Render(
            "Nothing to render: no sections with geometry".to_string(),
        ));
    }

    Ok((min_x, min_y, max_x, max_y))
}

fn to_render_error<E: std::fmt::Display>(e: E) -> SecmapError {
    SecmapError::Render(e.to_string())
}

/// Summary statistics over the merged dataset
#[derive(Debug, Clone)]
pub struct Summary {
    pub sections: usize,
    /// Sections with no tourist dwelling figure
    pub missing_dwellings: usize,
    pub total_dwellings: f64,
    pub max_dwellings: f64,
    pub mean_dwellings: f64,
    /// Highest-count sections, descending
    pub top: Vec<TopSection>,
}

#[derive(Debug, Clone)]
pub struct TopSection {
    pub cusec: String,
    pub municipality: Option<String>,
    pub tourist_dwellings: f64,
}

/// Compute the statistics the supervising analyst eyeballs after a run.
pub fn summarize(sections: &[MergedSection], top_n: usize) -> Summary {
    let mut values: Vec<(f64, &MergedSection)> = Vec::new();
    let mut missing = 0usize;

    for section in sections {
        match section
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.tourist_dwellings)
        {
            Some(value) => values.push((value, section)),
            None => missing += 1,
        }
    }

    let total: f64 = values.iter().map(|(value, _)| value).sum();
    let max = values.iter().map(|(value, _)| *value).fold(0.0, f64::max);
    let mean = if values.is_empty() {
        0.0
    } else {
        total / values.len() as f64
    };

    values.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let top = values
        .iter()
        .take(top_n)
        .map(|(value, section)| TopSection {
            cusec: section.shape.cusec.clone(),
            municipality: section.shape.municipality.clone(),
            tourist_dwellings: *value,
        })
        .collect();

    Summary {
        sections: sections.len(),
        missing_dwellings: missing,
        total_dwellings: total,
        max_dwellings: max,
        mean_dwellings: mean,
        top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::SectionShape;
    use geo_types::{polygon, MultiPolygon};
    use secmap_common::types::SectionRow;

    fn section(cusec: &str, dwellings: Option<f64>, offset: f64) -> MergedSection {
        MergedSection {
            shape: SectionShape {
                cusec: cusec.to_string(),
                municipality: Some("Madrid".to_string()),
                geometry: MultiPolygon(vec![polygon![
                    (x: offset, y: 0.0),
                    (x: offset + 0.01, y: 0.0),
                    (x: offset + 0.01, y: 0.01),
                    (x: offset, y: 0.0),
                ]]),
            },
            attributes: dwellings.map(|value| SectionRow {
                cusec: cusec.to_string(),
                tourist_dwellings: Some(value),
                plazas: None,
                tourist_dwellings_pct: None,
            }),
        }
    }

    #[test]
    fn test_fill_color_bins() {
        assert_eq!(fill_color(None), UNMATCHED);
        assert_eq!(fill_color(Some(0.0)), RAMP[0]);
        assert_eq!(fill_color(Some(3.0)), RAMP[1]);
        assert_eq!(fill_color(Some(7.0)), RAMP[2]);
        assert_eq!(fill_color(Some(120.0)), RAMP[5]);
    }

    #[test]
    fn test_summarize() {
        let sections = vec![
            section("001", Some(10.0), 0.0),
            section("002", Some(30.0), 0.02),
            section("003", None, 0.04),
        ];

        let summary = summarize(&sections, 1);
        assert_eq!(summary.sections, 3);
        assert_eq!(summary.missing_dwellings, 1);
        assert_eq!(summary.total_dwellings, 40.0);
        assert_eq!(summary.max_dwellings, 30.0);
        assert_eq!(summary.mean_dwellings, 20.0);
        assert_eq!(summary.top.len(), 1);
        assert_eq!(summary.top[0].cusec, "002");
    }

    #[test]
    fn test_choropleth_writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map.png");
        let sections = vec![section("001", Some(10.0), 0.0), section("002", None, 0.02)];

        choropleth(&sections, &output, 320, 240).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(!bytes.is_empty());
        // PNG signature
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_empty_dataset_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = choropleth(&[], &dir.path().join("map.png"), 100, 100);
        assert!(matches!(result, Err(SecmapError::Render(_))));
    }
}
