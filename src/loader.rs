use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::spreadsheet::{Document, SheetTable};
use calamine::{Data, ExcelDateTime, Range, Reader, Sheets, open_workbook_auto_from_rs};
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;

/// Serial of 9999-12-31, the last date Excel displays.
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

lazy_static! {
    static ref WORKBOOK_EXTENSION: Regex = Regex::new(r"(?i)\.(xlsx|xlsm|xlsb|xls|ods)$").unwrap();
}

/// Whether `file_name` carries one of the workbook extensions we can read.
pub fn is_workbook_file_name(file_name: &str) -> bool {
    WORKBOOK_EXTENSION.is_match(file_name)
}

/// Parse workbook bytes into a document.
///
/// The container format (xlsx, xlsb, xls, ods) is detected from the bytes. Row 0 of each
/// sheet becomes its headers and the remaining rows its data; the first sheet is active.
///
/// # Errors
/// * `SheetError::Parse` if the bytes are not a workbook or the workbook has no sheets
///
/// # Examples
/// ```no_run
/// use sheetedit::loader::from_bytes;
///
/// let bytes = std::fs::read("report.xlsx").unwrap();
/// let doc = from_bytes(&bytes).unwrap();
/// println!("active sheet: {}", doc.active_sheet());
/// ```
pub fn from_bytes(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(SheetError::parse("no data received"));
    }

    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(SheetError::parse("workbook contains no sheets"));
    }

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook.worksheet_range(&name)?;
        sheets.push((name, table_from_range(&range)));
    }

    Document::new(sheets)
}

/// Read and parse a workbook from disk.
pub fn from_path(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| SheetError::parse(format!("cannot read {}: {}", path.display(), e)))?;
    from_bytes(&bytes)
}

// Build a table anchored at A1, so leading blank rows and columns keep their position.
fn table_from_range(range: &Range<Data>) -> SheetTable {
    let Some((start_row, start_col)) = range.start() else {
        return SheetTable::default();
    };
    if range.is_empty() {
        return SheetTable::default();
    }

    let lead = start_col as usize;
    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; lead];
        cells.extend(row.iter().map(cell_value));
        grid.push(trim_trailing(cells));
    }

    let mut rows = grid.into_iter();
    let headers = rows
        .next()
        .map(|first| first.iter().map(CellValue::to_string).collect())
        .unwrap_or_default();

    SheetTable::new(headers, rows.collect())
}

fn trim_trailing(mut cells: Vec<CellValue>) -> Vec<CellValue> {
    while cells.last().is_some_and(CellValue::is_blank) {
        cells.pop();
    }
    cells
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => date_value(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

/// Date and duration cells become ISO 8601 and `h:mm:ss` text.
///
/// Serials Excel itself cannot display stay numbers.
fn date_value(dt: &ExcelDateTime) -> CellValue {
    let serial = dt.as_f64();
    if !serial.is_finite() || serial.abs() > MAX_DATE_SERIAL {
        return CellValue::Number(serial);
    }

    let text = if dt.is_duration() {
        dt.as_duration().map(format_duration)
    } else {
        // as_datetime accounts for the 1904 date system
        dt.as_datetime()
            .map(|datetime| datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
    };
    text.map_or(CellValue::Number(serial), CellValue::String)
}

fn format_duration(duration: chrono::Duration) -> String {
    let sign = if duration < chrono::Duration::zero() { "-" } else { "" };
    let secs = duration.num_seconds().unsigned_abs();
    format!("{}{}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60)
}
