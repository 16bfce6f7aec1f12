pub mod postgres;
pub mod sqlite;
pub mod storage;

pub use storage::{build_fetch_query, quote_ident, Dialect, FetchQuery, RowFilter, RowSource};
