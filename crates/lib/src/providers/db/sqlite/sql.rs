//! # SQLite Specific SQL Queries
//!
//! Catalog statements for the SQLite row source.

/// Lists user tables in creation order, skipping SQLite's internal tables.
pub const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%';";
