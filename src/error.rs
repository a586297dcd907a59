use thiserror::Error;

/// Every failure a workbook operation can report.
///
/// Errors are local to one operation. Nothing is retried: a cell edit that grows the
/// table is not safe to replay blindly.
#[derive(Debug, Error)]
pub enum SheetError {
    /// The bytes are not a workbook, or the workbook has no sheets.
    #[error("failed to parse workbook: {0}")]
    Parse(String),

    /// The requested sheet name is not part of the document.
    #[error("sheet not found: {0}")]
    UnknownSheet(String),

    /// The file identifier is not (or no longer) held by the store.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Negative or out-of-grid cell coordinates.
    #[error("invalid cell coordinates ({row}, {col}): {reason}")]
    Index { row: i64, col: i64, reason: String },

    /// Encoding or writing the exported workbook failed.
    #[error("failed to export workbook: {0}")]
    Serialize(String),

    /// The upload was rejected before parsing (wrong extension, missing file part).
    #[error("unsupported upload: {0}")]
    Unsupported(String),
}

impl SheetError {
    pub fn parse(msg: impl Into<String>) -> Self {
        SheetError::Parse(msg.into())
    }

    pub fn serialize(msg: impl Into<String>) -> Self {
        SheetError::Serialize(msg.into())
    }

    pub fn index(row: i64, col: i64, reason: impl Into<String>) -> Self {
        SheetError::Index {
            row,
            col,
            reason: reason.into(),
        }
    }
}

impl From<calamine::Error> for SheetError {
    fn from(e: calamine::Error) -> Self {
        SheetError::Parse(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        SheetError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
