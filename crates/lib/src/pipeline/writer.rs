//! # Worksheet Writer
//!
//! Clears and rewrites a worksheet from a record set. The sequence is not
//! transactional: if the process dies between `clear` and `update` the sheet
//! stays empty until the next successful run rewrites it.

use crate::errors::SyncError;
use crate::providers::sheet::{SheetStore, Worksheet};
use crate::types::RecordSet;
use tracing::{debug, info};

/// Grid capacity used when a worksheet has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetCapacity {
    pub rows: u32,
    pub columns: u32,
}

impl Default for SheetCapacity {
    fn default() -> Self {
        Self {
            rows: crate::constants::DEFAULT_SHEET_ROWS,
            columns: crate::constants::DEFAULT_SHEET_COLUMNS,
        }
    }
}

/// Returns the worksheet titled `title`, creating it with `capacity` if absent.
pub async fn get_or_create_worksheet(
    store: &dyn SheetStore,
    title: &str,
    capacity: SheetCapacity,
) -> Result<Worksheet, SyncError> {
    if let Some(ws) = store.worksheet(title).await? {
        return Ok(ws);
    }
    info!(
        "Worksheet '{title}' not found; creating it with {}x{} cells.",
        capacity.rows, capacity.columns
    );
    store
        .add_worksheet(title, capacity.rows, capacity.columns)
        .await
}

/// Replaces the content of `title` with a header row plus one row per record.
///
/// The worksheet grows to fit the data but never shrinks. Returns the number of
/// data rows written.
pub async fn write_record_set(
    store: &dyn SheetStore,
    title: &str,
    records: &RecordSet,
    capacity: SheetCapacity,
) -> Result<usize, SyncError> {
    let worksheet = get_or_create_worksheet(store, title, capacity).await?;

    store.clear(title).await?;

    let needed_rows = u32::try_from(records.len() + 1)
        .map_err(|_| SyncError::write(title, "too many rows for a worksheet"))?;
    let needed_columns = u32::try_from(records.columns().len().max(1))
        .map_err(|_| SyncError::write(title, "too many columns for a worksheet"))?;
    if worksheet.row_count < needed_rows || worksheet.column_count < needed_columns {
        let rows = worksheet.row_count.max(needed_rows);
        let columns = worksheet.column_count.max(needed_columns);
        debug!("Growing worksheet '{title}' to {rows}x{columns}.");
        store.resize(title, rows, columns).await?;
    }

    store.update(title, records.to_grid()).await?;
    Ok(records.len())
}
