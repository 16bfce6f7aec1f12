//! # sheetsync
//!
//! Exports database tables into a Google Sheets spreadsheet, one worksheet per
//! table. The crate holds the record model and the pure reshaping steps
//! (projection and incremental reconciliation), the row sources, the
//! `SheetStore` seam implemented by `sheetsync-sheets`, and the pipeline that
//! ties them together.

pub mod constants;
pub mod datetime;
pub mod errors;
pub mod pipeline;
pub mod projection;
pub mod providers;
pub mod reconcile;
pub mod types;

pub use errors::SyncError;
pub use pipeline::{RunSummary, SyncOptions, SyncPipeline, TableOutcome, TablePlan};
pub use projection::{project, ColumnProjection, ColumnRule, Transform};
pub use reconcile::{reconcile, RetentionWindow, UnparseableDatePolicy};
pub use types::{CellValue, Record, RecordSet, Value};
