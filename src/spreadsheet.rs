use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use serde::{Deserialize, Serialize};

/// Rows per worksheet in the xlsx grid, header row included.
pub const MAX_ROWS: u32 = 1_048_576;
/// Columns per worksheet in the xlsx grid.
pub const MAX_COLS: u16 = 16_384;
/// Cells a sheet may grow to through edits unless a caller picks its own budget.
pub const DEFAULT_MAX_CELLS: usize = 5_000_000;

/// Tabular content of one worksheet.
///
/// `headers` is the first row of the source sheet, `rows` everything below it. Rows are
/// indexed by column position and may be shorter or longer than `headers`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    #[serde(rename = "data")]
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        SheetTable { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Widest row, header row included.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    /// Data cells currently held, headers excluded.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Data cells `set(row, col, ..)` would add.
    pub fn growth_for(&self, row: usize, col: usize) -> usize {
        let width = self.headers.len();
        let new_rows = (row + 1).saturating_sub(self.rows.len());
        let row_len = self.rows.get(row).map_or(width, Vec::len);
        new_rows
            .saturating_mul(width)
            .saturating_add((col + 1).saturating_sub(row_len))
    }

    /// Write `value` at `[row][col]`, growing the table as needed.
    ///
    /// Missing rows are created as `headers.len()` empty strings; a row that is too short
    /// is padded with `Empty` up to `col`.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        let width = self.headers.len();
        while self.rows.len() <= row {
            self.rows.push(vec![CellValue::empty_string(); width]);
        }

        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }
}

/// A parsed multi-sheet workbook with one active sheet.
///
/// The tables are the only copy of the content: `headers()` and `data()` read straight
/// from the active table, so switching sheets never has anything to commit.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    sheet_names: Vec<String>,
    tables: Vec<SheetTable>,
    active: usize,
}

impl Document {
    /// Build a document from sheets in workbook order; the first sheet becomes active.
    pub fn new(sheets: Vec<(String, SheetTable)>) -> Result<Self> {
        if sheets.is_empty() {
            return Err(SheetError::parse("workbook contains no sheets"));
        }

        let mut sheet_names = Vec::with_capacity(sheets.len());
        let mut tables = Vec::with_capacity(sheets.len());
        for (name, table) in sheets {
            if sheet_names.contains(&name) {
                return Err(SheetError::parse(format!("duplicate sheet name: {}", name)));
            }
            sheet_names.push(name);
            tables.push(table);
        }

        Ok(Document {
            sheet_names,
            tables,
            active: 0,
        })
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn active_sheet(&self) -> &str {
        &self.sheet_names[self.active]
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetTable> {
        self.position(name).map(|i| &self.tables[i])
    }

    /// All sheets in workbook order.
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &SheetTable)> {
        self.sheet_names
            .iter()
            .map(String::as_str)
            .zip(self.tables.iter())
    }

    pub fn active(&self) -> &SheetTable {
        &self.tables[self.active]
    }

    pub fn headers(&self) -> &[String] {
        &self.active().headers
    }

    pub fn data(&self) -> &[Vec<CellValue>] {
        &self.active().rows
    }

    /// Make `name` the active sheet. Selecting the current sheet is a no-op.
    pub fn switch_sheet(&mut self, name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| SheetError::UnknownSheet(name.to_string()))?;
        self.active = index;
        Ok(())
    }

    /// Write one cell of the active sheet's data area (never the header row).
    ///
    /// Coordinates are zero-based and relative to the first data row. The sheet may grow
    /// to at most [`DEFAULT_MAX_CELLS`] data cells.
    pub fn set_cell(&mut self, row: i64, col: i64, value: CellValue) -> Result<()> {
        self.set_cell_within(row, col, value, DEFAULT_MAX_CELLS)
    }

    /// [`Document::set_cell`] with an explicit cell budget. An edit that would grow the
    /// active sheet past `max_cells` data cells is rejected and changes nothing; edits
    /// that do not grow the sheet always go through.
    pub fn set_cell_within(
        &mut self,
        row: i64,
        col: i64,
        value: CellValue,
        max_cells: usize,
    ) -> Result<()> {
        let (r, c) = check_coordinates(row, col)?;
        let table = &mut self.tables[self.active];

        let growth = table.growth_for(r, c);
        if growth > 0 && table.cell_count().saturating_add(growth) > max_cells {
            return Err(SheetError::index(
                row,
                col,
                format!("edit would grow the sheet beyond {} cells", max_cells),
            ));
        }

        table.set(r, c, value);
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sheet_names.iter().position(|n| n == name)
    }
}

/// Validate signed coordinates against the writable grid.
pub fn check_coordinates(row: i64, col: i64) -> Result<(usize, usize)> {
    if row < 0 || col < 0 {
        return Err(SheetError::index(row, col, "indices must be non-negative"));
    }
    // one grid row is taken by the headers
    if row >= i64::from(MAX_ROWS) - 1 {
        return Err(SheetError::index(row, col, "row is beyond the worksheet limit"));
    }
    if col >= i64::from(MAX_COLS) {
        return Err(SheetError::index(row, col, "column is beyond the worksheet limit"));
    }
    Ok((row as usize, col as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(vec![
            (
                "Sheet1".to_string(),
                SheetTable::new(
                    vec!["Name".into(), "Age".into()],
                    vec![vec!["Alice".into(), "30".into()]],
                ),
            ),
            (
                "Sheet2".to_string(),
                SheetTable::new(vec!["X".into()], vec![]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn first_sheet_is_active() {
        let doc = sample();
        assert_eq!(doc.sheet_names(), ["Sheet1", "Sheet2"]);
        assert_eq!(doc.active_sheet(), "Sheet1");
        assert_eq!(doc.headers(), ["Name", "Age"]);
    }

    #[test]
    fn zero_sheets_is_a_parse_error() {
        assert!(matches!(Document::new(vec![]), Err(SheetError::Parse(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Document::new(vec![
            ("A".into(), SheetTable::default()),
            ("A".into(), SheetTable::default()),
        ]);
        assert!(matches!(result, Err(SheetError::Parse(_))));
    }

    #[test]
    fn switching_to_active_sheet_changes_nothing() {
        let mut doc = sample();
        let before = doc.clone();
        doc.switch_sheet("Sheet1").unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn unknown_sheet_leaves_document_untouched() {
        let mut doc = sample();
        let before = doc.clone();
        let err = doc.switch_sheet("Nope").unwrap_err();
        assert!(matches!(err, SheetError::UnknownSheet(ref n) if n == "Nope"));
        assert_eq!(doc, before);
    }

    #[test]
    fn edits_survive_a_round_trip_through_another_sheet() {
        let mut doc = sample();
        doc.set_cell(0, 1, "31".into()).unwrap();
        assert_eq!(doc.data(), [vec![CellValue::from("Alice"), "31".into()]]);

        doc.switch_sheet("Sheet2").unwrap();
        assert_eq!(doc.headers(), ["X"]);
        assert!(doc.data().is_empty());
        assert_eq!(doc.sheet("Sheet1").unwrap().get(0, 1), Some(&CellValue::from("31")));

        doc.switch_sheet("Sheet1").unwrap();
        assert_eq!(doc.data()[0][1], CellValue::from("31"));
    }

    #[test]
    fn editing_past_the_last_row_pads_with_empty_strings() {
        let mut doc = Document::new(vec![(
            "S".into(),
            SheetTable::new(
                vec!["a".into(), "b".into()],
                vec![
                    vec![CellValue::Number(1.0), CellValue::Number(2.0)],
                    vec![CellValue::Number(3.0), CellValue::Number(4.0)],
                ],
            ),
        )])
        .unwrap();

        doc.set_cell(5, 0, "new".into()).unwrap();
        let data = doc.data();
        assert_eq!(data.len(), 6);
        assert_eq!(data[0], vec![CellValue::Number(1.0), CellValue::Number(2.0)]);
        assert_eq!(data[1], vec![CellValue::Number(3.0), CellValue::Number(4.0)]);
        for row in &data[2..5] {
            assert_eq!(row, &vec![CellValue::empty_string(); 2]);
        }
        assert_eq!(data[5][0], CellValue::from("new"));
    }

    #[test]
    fn editing_past_the_row_end_pads_with_empty_cells() {
        let mut doc = sample();
        doc.set_cell(0, 4, true.into()).unwrap();
        assert_eq!(
            doc.data()[0],
            vec![
                CellValue::from("Alice"),
                "30".into(),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Bool(true)
            ]
        );
        assert_eq!(doc.headers().len(), 2);
    }

    #[test]
    fn edits_only_touch_the_active_sheet() {
        let mut doc = sample();
        doc.switch_sheet("Sheet2").unwrap();
        doc.set_cell(0, 0, CellValue::Number(7.0)).unwrap();
        assert_eq!(doc.sheet("Sheet2").unwrap().rows, vec![vec![CellValue::Number(7.0)]]);
        assert_eq!(
            doc.sheet("Sheet1").unwrap(),
            sample().sheet("Sheet1").unwrap()
        );
    }

    #[test]
    fn bad_coordinates_are_index_errors() {
        let mut doc = sample();
        let before = doc.clone();
        for (r, c) in [(-1, 0), (0, -1), (i64::from(MAX_ROWS), 0), (0, i64::from(MAX_COLS))] {
            assert!(matches!(doc.set_cell(r, c, "x".into()), Err(SheetError::Index { .. })));
        }
        assert_eq!(doc, before);
    }

    #[test]
    fn width_counts_headers_and_rows() {
        let table = SheetTable::new(vec!["a".into()], vec![vec![CellValue::Empty; 3]]);
        assert_eq!(table.width(), 3);
        assert_eq!(SheetTable::default().width(), 0);
        assert!(SheetTable::default().is_empty());
    }

    #[test]
    fn growth_counts_padding_rows_and_cells() {
        let table = SheetTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![CellValue::Empty; 2]],
        );
        assert_eq!(table.cell_count(), 2);
        assert_eq!(table.growth_for(0, 1), 0);
        assert_eq!(table.growth_for(0, 4), 3);
        // rows 1 and 2 are new, each three cells wide
        assert_eq!(table.growth_for(2, 0), 6);
        assert_eq!(table.growth_for(2, 5), 9);
    }

    #[test]
    fn wide_sheet_growth_is_held_to_the_cell_budget() {
        let headers: Vec<String> = (0..200).map(|i| format!("h{}", i)).collect();
        let mut doc =
            Document::new(vec![("Wide".into(), SheetTable::new(headers, vec![]))]).unwrap();
        let before = doc.clone();

        let err = doc.set_cell(100_000, 0, "x".into()).unwrap_err();
        assert!(matches!(err, SheetError::Index { row: 100_000, col: 0, .. }));
        assert_eq!(doc, before);

        let err = doc.set_cell_within(10, 0, "x".into(), 1_000).unwrap_err();
        assert!(matches!(err, SheetError::Index { .. }));
        assert_eq!(doc, before);

        doc.set_cell_within(3, 0, "x".into(), 1_000).unwrap();
        assert_eq!(doc.active().cell_count(), 800);
    }

    #[test]
    fn edits_inside_the_table_ignore_the_budget() {
        let mut doc = sample();
        doc.set_cell_within(0, 0, "Bob".into(), 0).unwrap();
        assert_eq!(doc.data()[0][0], CellValue::from("Bob"));
        assert!(doc.set_cell_within(0, 2, "x".into(), 2).is_err());
    }
}
