use thiserror::Error;

/// Errors raised while exporting tables into a spreadsheet.
///
/// Only `CatalogUnavailable` and `Config` abort a whole run. Every other variant
/// is scoped to a single table: the pipeline records it against that table
/// and moves on to the next one.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Table catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("Failed to fetch rows from table '{table}': {message}")]
    TableFetchFailed { table: String, message: String },
    #[error("Failed to access worksheet '{sheet}': {message}")]
    SheetAccessFailed { sheet: String, message: String },
    #[error("Failed to write worksheet '{sheet}': {message}")]
    WriteFailed { sheet: String, message: String },
    #[error("Table '{table}' did not finish within {seconds}s")]
    Timeout { table: String, seconds: u64 },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Record shape mismatch: {0}")]
    Shape(String),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl SyncError {
    pub fn fetch(table: &str, err: impl std::fmt::Display) -> Self {
        SyncError::TableFetchFailed {
            table: table.to_string(),
            message: err.to_string(),
        }
    }

    pub fn access(sheet: &str, err: impl std::fmt::Display) -> Self {
        SyncError::SheetAccessFailed {
            sheet: sheet.to_string(),
            message: err.to_string(),
        }
    }

    pub fn write(sheet: &str, err: impl std::fmt::Display) -> Self {
        SyncError::WriteFailed {
            sheet: sheet.to_string(),
            message: err.to_string(),
        }
    }

    /// Returns `true` for errors that must stop the run instead of a single table.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::CatalogUnavailable(_) | SyncError::Config(_) | SyncError::Regex(_)
        )
    }
}
