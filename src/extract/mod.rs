// src/extract/mod.rs

pub mod header;
pub mod normalize;
pub mod numfmt;
pub mod records;

use crate::config::{ColumnLayout, SourceDescriptor};
use crate::error::{PipelineError, Result};
use crate::model::PharmacyRecord;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::io::Cursor;
use tracing::{debug, info};

pub use header::locate_header;
pub use normalize::normalize_rows;
pub use numfmt::render_number;
pub use records::extract_records;

/// Name of the only sheet the bureau listings are read from.
pub const SHEET_NAME: &str = "Sheet1";

/// Read every row of `Sheet1` from an in-memory `.xlsx` as displayed strings.
///
/// calamine trims leading empty rows/columns off a range; they are put back
/// here so column indices match the sheet's absolute layout. Numeric cells are
/// rendered through their number format, so a code stored as `1` under `00`
/// reads as `01`.
pub fn read_sheet_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| PipelineError::parse("xlsx workbook", e))?;
    let range = workbook
        .worksheet_range(SHEET_NAME)
        .map_err(|e| PipelineError::parse(format!("sheet {}", SHEET_NAME), e))?;

    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let formats = numfmt::cell_number_formats(bytes, SHEET_NAME)?;

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(start_row + range.height());
    rows.resize(start_row, Vec::new());
    for (i, cells) in range.rows().enumerate() {
        let mut row = Vec::with_capacity(start_col + cells.len());
        row.resize(start_col, String::new());
        row.extend(cells.iter().enumerate().map(|(j, c)| {
            display_cell(c, formats.get(&(start_row + i, start_col + j)))
        }));
        rows.push(row);
    }
    debug!(rows = rows.len(), start_row, start_col, "read sheet");
    Ok(rows)
}

fn display_cell(cell: &Data, format: Option<&String>) -> String {
    let value = match *cell {
        Data::Float(f) => f,
        Data::Int(i) => i as f64,
        _ => return cell.to_string(),
    };
    format
        .and_then(|code| render_number(value, code))
        .unwrap_or_else(|| cell.to_string())
}

/// Normalize, find the header, and group the data rows into records.
pub fn extract_from_rows(
    mut rows: Vec<Vec<String>>,
    layout: &ColumnLayout,
    source: &SourceDescriptor,
) -> Result<Vec<PharmacyRecord>> {
    normalize_rows(&mut rows, layout.min_width());
    let header_idx = locate_header(&rows, layout.id, &layout.header_marker)?;
    debug!(header_idx, "located header row");
    Ok(extract_records(&rows, header_idx, layout, source))
}

/// Full per-spreadsheet extraction: `.xlsx` bytes in, pharmacy records out.
#[tracing::instrument(level = "info", skip(bytes, layout, source), fields(department = %source.department))]
pub fn extract_pharmacies(
    name: &str,
    bytes: &[u8],
    layout: &ColumnLayout,
    source: &SourceDescriptor,
) -> Result<Vec<PharmacyRecord>> {
    let rows = read_sheet_rows(bytes)?;
    let records = extract_from_rows(rows, layout, source)?;
    info!(count = records.len(), "extracted pharmacies");
    Ok(records)
}
