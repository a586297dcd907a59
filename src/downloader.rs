use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::spreadsheet::{Document, SheetTable};
use rust_xlsxwriter::{Workbook, Worksheet};

/// Convert a document to XLSX bytes.
///
/// Every sheet is written, in `sheet_names` order, as a rectangular grid with the headers
/// in row 0 and the data below. Blank values (`Empty` or `""`) are left as blank cells.
///
/// # Errors
/// * `SheetError::Serialize` if a sheet name is not valid in Excel or the content does
///   not fit the worksheet grid
///
/// # Examples
/// ```
/// use sheetedit::downloader::to_xlsx;
/// use sheetedit::spreadsheet::{Document, SheetTable};
///
/// let doc = Document::new(vec![("Sheet1".to_string(), SheetTable::default())]).unwrap();
/// let bytes = to_xlsx(&doc).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(doc: &Document) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for (name, table) in doc.sheets() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_table(worksheet, table)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_table(worksheet: &mut Worksheet, table: &SheetTable) -> Result<()> {
    for (c, header) in table.headers.iter().enumerate() {
        if !header.is_empty() {
            worksheet.write_string(0, column(c)?, header.as_str())?;
        }
    }

    for (r, cells) in table.rows.iter().enumerate() {
        let row = u32::try_from(r + 1)
            .map_err(|_| SheetError::serialize(format!("row {} is out of range", r)))?;
        for (c, value) in cells.iter().enumerate() {
            write_value(worksheet, row, column(c)?, value)?;
        }
    }

    Ok(())
}

fn write_value(worksheet: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Empty => {}
        CellValue::String(s) if s.is_empty() => {}
        CellValue::String(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
    }
    Ok(())
}

fn column(c: usize) -> Result<u16> {
    u16::try_from(c).map_err(|_| SheetError::serialize(format!("column {} is out of range", c)))
}

/// Convert one sheet to CSV.
///
/// The headers form the first line. Fields containing commas, quotes or newlines are
/// quoted, with embedded quotes doubled. Rows keep their own length.
pub fn to_csv(table: &SheetTable) -> String {
    let mut csv_content = String::new();

    push_csv_line(&mut csv_content, table.headers.iter().map(String::as_str));
    for cells in &table.rows {
        let fields: Vec<String> = cells.iter().map(CellValue::to_string).collect();
        push_csv_line(&mut csv_content, fields.iter().map(String::as_str));
    }

    csv_content
}

fn push_csv_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, value) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert column number to letter (0 = A, 25 = Z, 26 = AA)
pub fn column_to_letter(col: usize) -> String {
    let mut name = String::new();
    let mut n = col + 1;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escapes_special_characters() {
        let table = SheetTable::new(
            vec!["Name".into(), "Note".into()],
            vec![
                vec!["Alice".into(), "says \"hi\"".into()],
                vec!["Bob, Jr.".into(), CellValue::Number(3.0), CellValue::Bool(true)],
                vec![],
            ],
        );
        assert_eq!(
            to_csv(&table),
            "Name,Note\nAlice,\"says \"\"hi\"\"\"\n\"Bob, Jr.\",3,true\n\n"
        );
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letter(0), "A");
        assert_eq!(column_to_letter(25), "Z");
        assert_eq!(column_to_letter(26), "AA");
        assert_eq!(column_to_letter(51), "AZ");
    }

    #[test]
    fn invalid_sheet_name_is_a_serialize_error() {
        let doc = Document::new(vec![("bad[name]".to_string(), SheetTable::default())]).unwrap();
        assert!(matches!(to_xlsx(&doc), Err(SheetError::Serialize(_))));
    }
}
