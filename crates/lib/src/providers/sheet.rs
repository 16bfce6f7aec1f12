use crate::errors::SyncError;
use crate::types::CellValue;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A worksheet inside the destination spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub title: String,
    pub sheet_id: i64,
    pub row_count: u32,
    pub column_count: u32,
}

/// A trait for reading and writing worksheets of one spreadsheet.
///
/// Every method addresses a worksheet by title. Read-side failures should be
/// reported as `SyncError::SheetAccessFailed`, write-side failures as
/// `SyncError::WriteFailed`.
#[async_trait]
pub trait SheetStore: Send + Sync + DynClone + Debug {
    /// Looks up a worksheet by title.
    async fn worksheet(&self, title: &str) -> Result<Option<Worksheet>, SyncError>;

    /// Adds a worksheet with the given grid capacity.
    async fn add_worksheet(&self, title: &str, rows: u32, columns: u32)
        -> Result<Worksheet, SyncError>;

    /// Reads every populated row, header included. Cells keep their stored
    /// type: numbers and booleans are not rendered as display text.
    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<CellValue>>, SyncError>;

    /// Clears all cell values, keeping the worksheet and its capacity.
    async fn clear(&self, title: &str) -> Result<(), SyncError>;

    /// Sets the grid capacity of the worksheet.
    async fn resize(&self, title: &str, rows: u32, columns: u32) -> Result<(), SyncError>;

    /// Writes `grid` starting at cell A1.
    async fn update(&self, title: &str, grid: Vec<Vec<CellValue>>) -> Result<(), SyncError>;
}

dyn_clone::clone_trait_object!(SheetStore);
