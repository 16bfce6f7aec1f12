//! # Shared Test Fixtures
//!
//! In-memory stand-ins for the two external collaborators of the pipeline,
//! plus a seeded in-memory SQLite source.

use anyhow::Result;
use async_trait::async_trait;
use sheetsync::providers::db::sqlite::SqliteSource;
use sheetsync::providers::db::{RowFilter, RowSource};
use sheetsync::providers::sheet::{SheetStore, Worksheet};
use sheetsync::{CellValue, RecordSet, SyncError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Installs a test subscriber once; later calls are no-ops.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// --- SQLite Setup ---

/// A helper struct holding an isolated, seeded in-memory database.
pub struct TestSetup {
    pub source: SqliteSource,
}

impl TestSetup {
    /// Creates a new in-memory database and runs `seed_sql` against it.
    pub async fn new(seed_sql: &str) -> Result<Self> {
        let db = turso::Builder::new_local(":memory:").build().await?;
        let source = SqliteSource::from_database(db);
        source.execute_batch(seed_sql).await?;
        Ok(Self { source })
    }
}

// --- Scripted Row Source ---

#[derive(Debug, Default)]
struct SourceState {
    tables: Vec<(String, RecordSet)>,
    failing: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    catalog_error: Option<String>,
    fetches: Vec<(String, RowFilter)>,
}

/// A row source serving fixed record sets, applying filters in memory.
#[derive(Clone, Debug, Default)]
pub struct MockRowSource {
    state: Arc<Mutex<SourceState>>,
}

impl MockRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table; catalog order follows registration order.
    pub fn add_table(&self, name: &str, records: RecordSet) {
        self.state
            .lock()
            .unwrap()
            .tables
            .push((name.to_string(), records));
    }

    /// Makes every fetch of `name` fail with `message`.
    pub fn fail_table(&self, name: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(name.to_string(), message.to_string());
    }

    /// Delays every fetch of `name`.
    pub fn delay_table(&self, name: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(name.to_string(), delay);
    }

    pub fn fail_catalog(&self, message: &str) {
        self.state.lock().unwrap().catalog_error = Some(message.to_string());
    }

    /// Retrieves the recorded fetches for assertion.
    pub fn fetches(&self) -> Vec<(String, RowFilter)> {
        self.state.lock().unwrap().fetches.clone()
    }
}

#[async_trait]
impl RowSource for MockRowSource {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, SyncError> {
        let state = self.state.lock().unwrap();
        if let Some(msg) = &state.catalog_error {
            return Err(SyncError::CatalogUnavailable(msg.clone()));
        }
        Ok(state.tables.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn fetch(&self, table: &str, filter: &RowFilter) -> Result<RecordSet, SyncError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push((table.to_string(), filter.clone()));
            state.delays.get(table).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if let Some(msg) = state.failing.get(table) {
            return Err(SyncError::fetch(table, msg));
        }
        state
            .tables
            .iter()
            .find(|(n, _)| n == table)
            .map(|(_, records)| filter.apply(records))
            .ok_or_else(|| SyncError::fetch(table, format!("relation \"{table}\" does not exist")))
    }
}

// --- In-Memory Sheet Store ---

#[derive(Debug, Clone)]
pub struct MemoryWorksheet {
    pub info: Worksheet,
    pub cells: Vec<Vec<CellValue>>,
}

#[derive(Debug, Default)]
struct StoreState {
    sheets: Vec<MemoryWorksheet>,
    calls: Vec<String>,
    failing_writes: HashMap<String, String>,
    failing_reads: HashMap<String, String>,
}

/// A spreadsheet held in memory, recording every call made to it.
#[derive(Clone, Debug, Default)]
pub struct MemorySheetStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a worksheet with text cells.
    pub fn seed(&self, title: &str, rows: &[&[&str]]) {
        let cells: Vec<Vec<CellValue>> = rows
            .iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect();
        let mut state = self.state.lock().unwrap();
        let sheet_id = state.sheets.len() as i64;
        state.sheets.push(MemoryWorksheet {
            info: Worksheet {
                title: title.to_string(),
                sheet_id,
                row_count: 1000,
                column_count: 26,
            },
            cells,
        });
    }

    /// Makes every `update` of `title` fail with `message`.
    pub fn fail_writes(&self, title: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(title.to_string(), message.to_string());
    }

    /// Makes every `read_rows` of `title` fail with `message`.
    pub fn fail_reads(&self, title: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_reads
            .insert(title.to_string(), message.to_string());
    }

    pub fn sheet(&self, title: &str) -> Option<MemoryWorksheet> {
        let state = self.state.lock().unwrap();
        state.sheets.iter().find(|s| s.info.title == title).cloned()
    }

    /// The cell grid of `title` rendered as display strings.
    pub fn text(&self, title: &str) -> Vec<Vec<String>> {
        self.sheet(title)
            .map(|s| s.cells.iter().map(|r| r.iter().map(display).collect()).collect())
            .unwrap_or_default()
    }

    /// Retrieves the recorded calls (e.g. `"clear:Ingreso"`) for assertion.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

fn display(cell: &CellValue) -> String {
    match cell {
        CellValue::String(s) => s.clone(),
        CellValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn with_sheet<T>(
    state: &mut StoreState,
    title: &str,
    f: impl FnOnce(&mut MemoryWorksheet) -> T,
) -> Result<T, SyncError> {
    state
        .sheets
        .iter_mut()
        .find(|s| s.info.title == title)
        .map(f)
        .ok_or_else(|| SyncError::access(title, "worksheet not found"))
}

#[async_trait]
impl SheetStore for MemorySheetStore {
    async fn worksheet(&self, title: &str) -> Result<Option<Worksheet>, SyncError> {
        Ok(self.sheet(title).map(|s| s.info))
    }

    async fn add_worksheet(
        &self,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<Worksheet, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("add:{title}"));
        if state.sheets.iter().any(|s| s.info.title == title) {
            return Err(SyncError::access(title, "a sheet with this name already exists"));
        }
        let info = Worksheet {
            title: title.to_string(),
            sheet_id: state.sheets.len() as i64,
            row_count: rows,
            column_count: columns,
        };
        state.sheets.push(MemoryWorksheet {
            info: info.clone(),
            cells: Vec::new(),
        });
        Ok(info)
    }

    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<CellValue>>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("read:{title}"));
        if let Some(msg) = state.failing_reads.get(title) {
            return Err(SyncError::access(title, msg));
        }
        with_sheet(&mut state, title, |s| s.cells.clone())
    }

    async fn clear(&self, title: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("clear:{title}"));
        with_sheet(&mut state, title, |s| s.cells.clear())
    }

    async fn resize(&self, title: &str, rows: u32, columns: u32) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("resize:{title}:{rows}x{columns}"));
        with_sheet(&mut state, title, |s| {
            s.info.row_count = rows;
            s.info.column_count = columns;
        })
    }

    async fn update(&self, title: &str, grid: Vec<Vec<CellValue>>) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update:{title}"));
        if let Some(msg) = state.failing_writes.get(title) {
            return Err(SyncError::write(title, msg));
        }
        let (rows, columns) = with_sheet(&mut state, title, |s| {
            (s.info.row_count as usize, s.info.column_count as usize)
        })?;
        if grid.len() > rows || grid.iter().any(|r| r.len() > columns) {
            return Err(SyncError::write(title, "grid exceeds worksheet capacity"));
        }
        with_sheet(&mut state, title, |s| s.cells = grid)
    }
}
