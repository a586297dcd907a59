use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::downloader::to_xlsx;
use crate::error::{Result, SheetError};
use crate::spreadsheet::Document;

/// Export a document to an xlsx file at `path`.
///
/// The workbook is fully encoded first, then written to a temporary file next to `path`
/// and renamed over it. On any failure the destination is left as it was and the
/// temporary file is removed.
pub fn save_workbook(doc: &Document, path: impl AsRef<Path>) -> Result<()> {
    let bytes = to_xlsx(doc)?;
    write_atomically(path.as_ref(), &bytes)
}

pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let io_err = |e: std::io::Error| SheetError::serialize(format!("{}: {}", path.display(), e));

    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::SheetTable;

    #[test]
    fn failed_export_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.xlsx");
        let doc = Document::new(vec![("bad/name".to_string(), SheetTable::default())]).unwrap();

        assert!(matches!(save_workbook(&doc, &target), Err(SheetError::Serialize(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_destination_is_a_serialize_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.xlsx");
        let doc = Document::new(vec![("Sheet1".to_string(), SheetTable::default())]).unwrap();

        assert!(matches!(save_workbook(&doc, &target), Err(SheetError::Serialize(_))));
        assert!(!target.exists());
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.xlsx");
        std::fs::write(&target, b"old").unwrap();
        let doc = Document::new(vec![("Sheet1".to_string(), SheetTable::default())]).unwrap();

        save_workbook(&doc, &target).unwrap();
        assert!(std::fs::read(&target).unwrap().starts_with(b"PK"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
