//! Excel workbook to CSV conversion
//!
//! Reads one sheet of the tourist housing release and writes it out as
//! CSV for the merge step. Cell rendering keeps code columns textual so
//! identifiers like `08019001001` survive with their leading zeros.

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use secmap_common::{Result, SecmapError};
use std::path::Path;
use tracing::info;

/// Default sheet name in the INE tourist housing workbook
pub const DEFAULT_SHEET: &str = "Secciones";

/// Rows and columns written by a conversion
#[derive(Debug, Clone, Copy)]
pub struct ConvertReport {
    pub rows: usize,
    pub columns: usize,
}

/// Convert one sheet of an Excel workbook to a CSV file.
pub fn excel_to_csv(input: &Path, sheet: &str, output: &Path) -> Result<ConvertReport> {
    info!("Reading {} (sheet {:?})", input.display(), sheet);

    let mut workbook: Xlsx<std::io::BufReader<std::fs::File>> =
        open_workbook(input).map_err(|e: XlsxError| SecmapError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| SecmapError::Spreadsheet(e.to_string()))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let report = write_rows(
        range.rows().map(|row| row.iter().map(render_cell).collect()),
        output,
    )?;

    info!(
        "Wrote {} rows and {} columns to {}",
        report.rows,
        report.columns,
        output.display()
    );

    Ok(report)
}

/// Write pre-rendered rows out as CSV.
pub(crate) fn write_rows<I>(rows: I, output: &Path) -> Result<ConvertReport>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut writer =
        csv::Writer::from_path(output).map_err(|e| SecmapError::Csv(e.to_string()))?;

    let mut row_count = 0usize;
    let mut columns = 0usize;
    for row in rows {
        columns = columns.max(row.len());
        writer
            .write_record(&row)
            .map_err(|e| SecmapError::Csv(e.to_string()))?;
        row_count += 1;
    }
    writer.flush()?;

    Ok(ConvertReport {
        // The header row is not data
        rows: row_count.saturating_sub(1),
        columns,
    })
}

/// Render one spreadsheet cell as CSV text.
///
/// Whole floats lose the trailing `.0` the way a spreadsheet displays
/// them; strings pass through untouched, which is what keeps CUSEC codes
/// intact.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cell_keeps_codes_textual() {
        let cell = Data::String("08019001001".to_string());
        assert_eq!(render_cell(&cell), "08019001001");
    }

    #[test]
    fn test_render_cell_whole_floats() {
        assert_eq!(render_cell(&Data::Float(5.0)), "5");
        assert_eq!(render_cell(&Data::Float(1.25)), "1.25");
        assert_eq!(render_cell(&Data::Int(42)), "42");
        assert_eq!(render_cell(&Data::Empty), "");
    }

    #[test]
    fn test_write_rows() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("secciones.csv");

        let rows = vec![
            vec!["CUSEC".to_string(), "vivienda turistica".to_string()],
            vec!["08019001001".to_string(), "5".to_string()],
            vec!["08019001002".to_string(), String::new()],
        ];
        let report = write_rows(rows.into_iter(), &output).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.columns, 2);

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("CUSEC,vivienda turistica\n"));
        assert!(written.contains("08019001001,5\n"));
    }

    #[test]
    fn test_missing_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = excel_to_csv(
            &dir.path().join("missing.xlsx"),
            DEFAULT_SHEET,
            &dir.path().join("out.csv"),
        );
        assert!(matches!(result, Err(SecmapError::Spreadsheet(_))));
    }
}
