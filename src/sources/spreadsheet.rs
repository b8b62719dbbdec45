//! Workbook download payloads turned into header-keyed rows.

use crate::error::{Result, SyncError};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::collections::BTreeMap;
use std::io::Cursor;

/// One data row of the first worksheet, keyed by the header row
pub type SheetRow = BTreeMap<String, String>;

/// Read the first worksheet of an `.xlsx`/`.xls`/`.ods` payload.
///
/// The first row is the header; fully empty rows are dropped. Date cells are
/// rendered as `YYYY-MM-DD`.
pub fn sheet_rows(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SyncError::Spreadsheet(e.to_string()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SyncError::Spreadsheet("workbook has no sheets".into()))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| SyncError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(|c| cell_text(c).trim().to_string()).collect();

    Ok(rows_from_cells(&header, rows.map(|r| r.iter().map(cell_text).collect())))
}

pub(crate) fn rows_from_cells<I>(header: &[String], rows: I) -> Vec<SheetRow>
where
    I: Iterator<Item = Vec<String>>,
{
    rows.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| {
            header
                .iter()
                .zip(cells)
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.clone(), value.trim().to_string()))
                .collect()
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Column value or empty string
pub fn column<'a>(row: &'a SheetRow, key: &str) -> &'a str {
    row.get(key).map(String::as_str).unwrap_or("")
}
