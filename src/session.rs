//! Workbook editing surfaces shared by every front end.
//!
//! [`LocalSession`] keeps one document in-process (the CLI uses it). [`StoreService`]
//! keeps many documents in a [`DocumentStore`] keyed by file id and is what the HTTP
//! adapter talks to through [`WorkbookService`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cell::CellValue;
use crate::downloader::{to_csv, to_xlsx};
use crate::error::{Result, SheetError};
use crate::loader::{self, is_workbook_file_name};
use crate::saving;
use crate::spreadsheet::{DEFAULT_MAX_CELLS, Document};
use crate::store::{DocumentStore, FileId, StoredFile, lock_file};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Every sheet, as an xlsx workbook.
    #[default]
    Xlsx,
    /// The active sheet only.
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Encoded export ready to hand to a client.
#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

/// A document together with the id and name it is known by.
///
/// `document` is a snapshot shared with the store; later edits to the file do not show
/// through it.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub file_id: FileId,
    pub file_name: String,
    pub document: Arc<Document>,
}

/// Encode `doc` and name the result after `file_name`, with the extension the format
/// implies.
pub fn export_document(doc: &Document, file_name: &str, format: ExportFormat) -> Result<Export> {
    let bytes = match format {
        ExportFormat::Xlsx => to_xlsx(doc)?,
        ExportFormat::Csv => to_csv(doc.active()).into_bytes(),
    };
    Ok(Export {
        file_name: with_extension(file_name, format.extension()),
        format,
        bytes,
    })
}

/// Replace (or add) the extension of a bare file name.
pub fn with_extension(file_name: &str, extension: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let stem = if stem.is_empty() { "spreadsheet-export" } else { stem };
    format!("{}.{}", stem, extension)
}

fn parse_upload(file_name: &str, bytes: &[u8]) -> Result<Document> {
    if !is_workbook_file_name(file_name) {
        return Err(SheetError::Unsupported(format!(
            "{} is not an Excel file (.xlsx or .xls)",
            file_name
        )));
    }
    loader::from_bytes(bytes)
}

/// In-process editing of a single workbook.
#[derive(Debug, Clone)]
pub struct LocalSession {
    file_name: String,
    document: Document,
}

impl LocalSession {
    /// Parse an uploaded workbook.
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let document = parse_upload(file_name, bytes)?;
        Ok(LocalSession {
            file_name: file_name.to_string(),
            document,
        })
    }

    /// Open a workbook from disk; the export name defaults to the file's own name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if !is_workbook_file_name(&file_name) {
            return Err(SheetError::Unsupported(format!(
                "{} is not an Excel file",
                path.display()
            )));
        }
        Ok(LocalSession {
            document: loader::from_path(path)?,
            file_name,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn switch_sheet(&mut self, sheet_name: &str) -> Result<&Document> {
        self.document.switch_sheet(sheet_name)?;
        Ok(&self.document)
    }

    pub fn update_cell(&mut self, row: i64, col: i64, value: CellValue) -> Result<&Document> {
        self.document.set_cell(row, col, value)?;
        Ok(&self.document)
    }

    pub fn export(&self, file_name: Option<&str>, format: ExportFormat) -> Result<Export> {
        export_document(
            &self.document,
            file_name.unwrap_or(self.file_name.as_str()),
            format,
        )
    }

    /// Write the workbook to `path` without ever leaving a partial file there.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        saving::save_workbook(&self.document, path)
    }
}

/// Operations a remote front end can perform on stored workbooks.
pub trait WorkbookService: Send + Sync {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<OpenFile>;
    fn open_file(&self, file_id: &str) -> Result<OpenFile>;
    fn switch_sheet(&self, file_id: &str, sheet_name: &str) -> Result<OpenFile>;
    fn update_cell(&self, file_id: &str, row: i64, col: i64, value: CellValue)
    -> Result<OpenFile>;
    fn export(
        &self,
        file_id: &str,
        file_name: Option<&str>,
        format: ExportFormat,
    ) -> Result<Export>;
    fn close(&self, file_id: &str) -> Result<()>;
    /// Drop expired files; returns how many went away.
    fn evict_expired(&self) -> usize;
}

/// [`WorkbookService`] over an injected [`DocumentStore`].
#[derive(Clone)]
pub struct StoreService {
    store: Arc<dyn DocumentStore>,
    max_cells: usize,
}

impl StoreService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        StoreService {
            store,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    /// Limit how many data cells a sheet may grow to through `update_cell`.
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    // Run `f` while holding the file's lock, so operations on one file never interleave.
    fn with_file<T>(
        &self,
        file_id: &str,
        f: impl FnOnce(&mut StoredFile) -> Result<T>,
    ) -> Result<T> {
        let handle = self.store.get(file_id)?;
        let mut stored = lock_file(&handle);
        f(&mut *stored)
    }
}

fn snapshot(file_id: &str, stored: &StoredFile) -> OpenFile {
    OpenFile {
        file_id: file_id.to_string(),
        file_name: stored.original_name.clone(),
        document: Arc::clone(&stored.document),
    }
}

impl WorkbookService for StoreService {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<OpenFile> {
        let document = Arc::new(parse_upload(file_name, bytes)?);
        let file_id = self
            .store
            .insert(StoredFile::new(file_name, Arc::clone(&document)));
        log::info!(
            "uploaded {} as {} ({} sheet(s))",
            file_name,
            file_id,
            document.sheet_names().len()
        );
        Ok(OpenFile {
            file_id,
            file_name: file_name.to_string(),
            document,
        })
    }

    fn open_file(&self, file_id: &str) -> Result<OpenFile> {
        self.with_file(file_id, |stored| Ok(snapshot(file_id, stored)))
    }

    fn switch_sheet(&self, file_id: &str, sheet_name: &str) -> Result<OpenFile> {
        self.with_file(file_id, |stored| {
            if stored.document.active_sheet() != sheet_name {
                stored.document_mut().switch_sheet(sheet_name)?;
            }
            Ok(snapshot(file_id, stored))
        })
    }

    fn update_cell(
        &self,
        file_id: &str,
        row: i64,
        col: i64,
        value: CellValue,
    ) -> Result<OpenFile> {
        self.with_file(file_id, |stored| {
            stored
                .document_mut()
                .set_cell_within(row, col, value, self.max_cells)?;
            Ok(snapshot(file_id, stored))
        })
    }

    fn export(
        &self,
        file_id: &str,
        file_name: Option<&str>,
        format: ExportFormat,
    ) -> Result<Export> {
        self.with_file(file_id, |stored| {
            let name = file_name.unwrap_or(stored.original_name.as_str());
            export_document(&stored.document, name, format)
        })
    }

    fn close(&self, file_id: &str) -> Result<()> {
        self.store.remove(file_id)
    }

    fn evict_expired(&self) -> usize {
        self.store.evict_expired(Instant::now()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_names_follow_the_format() {
        assert_eq!(with_extension("report.xls", "xlsx"), "report.xlsx");
        assert_eq!(with_extension("report.xlsx", "csv"), "report.csv");
        assert_eq!(with_extension("archive.tar.xlsx", "xlsx"), "archive.tar.xlsx");
        assert_eq!(with_extension("noext", "xlsx"), "noext.xlsx");
        assert_eq!(with_extension(".hidden", "xlsx"), ".hidden.xlsx");
        assert_eq!(with_extension("", "xlsx"), "spreadsheet-export.xlsx");
    }

    #[test]
    fn non_workbook_names_are_rejected_before_parsing() {
        let err = LocalSession::from_bytes("notes.txt", b"hello").unwrap_err();
        assert!(matches!(err, SheetError::Unsupported(_)));
    }

    fn uploaded(service: &StoreService) -> FileId {
        let doc = Document::new(vec![(
            "Sheet1".to_string(),
            crate::spreadsheet::SheetTable::new(vec!["a".into(), "b".into()], vec![]),
        )])
        .unwrap();
        service.store.insert(StoredFile::new("a.xlsx", doc))
    }

    #[test]
    fn cell_budget_rejects_growth_and_keeps_the_file() {
        let service =
            StoreService::new(Arc::new(crate::store::MemoryStore::default())).with_max_cells(10);
        let id = uploaded(&service);

        let err = service.update_cell(&id, 5, 0, "x".into()).unwrap_err();
        assert!(matches!(err, SheetError::Index { .. }));
        assert!(service.open_file(&id).unwrap().document.data().is_empty());

        let open = service.update_cell(&id, 4, 0, "x".into()).unwrap();
        assert_eq!(open.document.data().len(), 5);
    }

    #[test]
    fn earlier_responses_keep_their_contents() {
        let service = StoreService::new(Arc::new(crate::store::MemoryStore::default()));
        let id = uploaded(&service);

        let first = service.open_file(&id).unwrap();
        let second = service.update_cell(&id, 0, 0, "x".into()).unwrap();
        assert!(first.document.data().is_empty());
        assert_eq!(second.document.data()[0][0], CellValue::from("x"));

        let third = service.open_file(&id).unwrap();
        assert!(Arc::ptr_eq(&second.document, &third.document));
        assert!(matches!(
            service.switch_sheet(&id, "Nope"),
            Err(SheetError::UnknownSheet(_))
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let service = StoreService::new(Arc::new(crate::store::MemoryStore::default()));
        assert!(matches!(service.open_file("nope"), Err(SheetError::NotFound(_))));
        assert!(matches!(
            service.update_cell("nope", 0, 0, CellValue::Empty),
            Err(SheetError::NotFound(_))
        ));
        assert!(matches!(service.close("nope"), Err(SheetError::NotFound(_))));
    }
}
