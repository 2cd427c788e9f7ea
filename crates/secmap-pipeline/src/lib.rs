//! Secmap Pipeline Library
//!
//! Tools for turning the Spanish census-section tourist housing release
//! into web-ready map data.
//!
//! # Pipeline Stages
//!
//! - **convert**: Excel workbook sheet to CSV
//! - **sections**: shapefile loading, reprojection, simplification, writers
//! - **merge**: left join of geometry and tabular data on the CUSEC code
//! - **publish**: versioned + latest upload to S3-compatible storage
//! - **render**: static choropleth map and summary statistics
//!
//! # Example
//!
//! ```no_run
//! use secmap_pipeline::{merge, sections};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let (crs, mut shapes) = sections::read_shapefile(Path::new("data/secciones.shp"))?;
//!     sections::reproject_to_wgs84(crs, &mut shapes)?;
//!     let rows = merge::read_section_rows(Path::new("data/secciones.csv"))?;
//!     let (merged, unmatched) = merge::left_join(shapes, rows);
//!     println!("{} merged sections, {} without tabular data", merged.len(), unmatched);
//!     Ok(())
//! }
//! ```

pub mod content_type;
pub mod convert;
pub mod merge;
pub mod publish;
pub mod render;
pub mod sections;
pub mod storage;
