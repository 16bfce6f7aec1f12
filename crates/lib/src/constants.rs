//! # Shared Constants
//!
//! Values shared by the library, the Sheets client and the CLI so that the
//! defaults only live in one place.

/// The spreadsheet every run exports into unless `SPREADSHEET_ID` overrides it.
pub const DEFAULT_SPREADSHEET_ID: &str = "1MhtXjziojWiYjLRbYkmfrd-Dt2vsie102n6_CUFteFg";

/// Tables exported when neither a static list nor a catalog query is configured.
pub const DEFAULT_TABLES: [&str; 2] = ["Ingreso", "Inventario"];

/// The schema listed by catalog-based table enumeration.
pub const DEFAULT_SCHEMA: &str = "public";

/// Row capacity of a freshly created worksheet.
pub const DEFAULT_SHEET_ROWS: u32 = 100;

/// Column capacity of a freshly created worksheet.
pub const DEFAULT_SHEET_COLUMNS: u32 = 20;

/// The textual pattern used when timestamps are written to a sheet.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The textual pattern used when dates are written to a sheet.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
