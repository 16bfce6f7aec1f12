//! # Sync Pipeline
//!
//! Enumerates tables, then exports each one in turn:
//! fetch, project, reconcile (incremental mode only), write.
//! Each table runs behind its own failure boundary; a failing table is
//! recorded in the run summary and the loop moves on.

pub mod enumerate;
pub mod plan;
pub mod writer;

pub use enumerate::enumerate_tables;
pub use plan::{FilterSpec, SyncMode, TablePlan, TableSelection};
pub use writer::{get_or_create_worksheet, write_record_set, SheetCapacity};

use crate::errors::SyncError;
use crate::projection::project;
use crate::providers::{db::RowSource, sheet::SheetStore};
use crate::reconcile::reconcile;
use crate::types::RecordSet;
use chrono::NaiveDate;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// The stages a table moves through during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStage {
    Pending,
    Fetched,
    Projected,
    Reconciled,
    Written,
    Failed,
}

impl fmt::Display for TableStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableStage::Pending => "pending",
            TableStage::Fetched => "fetched",
            TableStage::Projected => "projected",
            TableStage::Reconciled => "reconciled",
            TableStage::Written => "written",
            TableStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts from the incremental merge of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCounts {
    pub kept: usize,
    pub superseded: usize,
    pub discarded: usize,
}

/// A table that reached `Written`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOutcome {
    pub table: String,
    pub worksheet: String,
    pub rows_fetched: usize,
    pub rows_written: usize,
    /// Declared columns missing from the fetched data.
    pub dropped_columns: Vec<String>,
    pub merge: Option<MergeCounts>,
}

/// A table that failed, with the last stage it completed.
#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub last_stage: TableStage,
    pub error: SyncError,
}

pub type TableReport = Result<TableOutcome, TableFailure>;

/// Progress notifications emitted while a run advances.
#[derive(Debug)]
pub enum Progress<'r> {
    /// A table is about to be fetched.
    Started(&'r str),
    /// A table reached its terminal stage.
    Finished(&'r TableReport),
}

/// Per-table results of one run, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TableReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableFailure> {
        self.outcomes.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn total_rows(&self) -> usize {
        self.succeeded().map(|o| o.rows_written).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    /// The terminal stage of every table, in processing order.
    pub fn stages(&self) -> Vec<(&str, TableStage)> {
        self.outcomes
            .iter()
            .map(|r| match r {
                Ok(o) => (o.table.as_str(), TableStage::Written),
                Err(f) => (f.table.as_str(), TableStage::Failed),
            })
            .collect()
    }
}

/// Run-wide settings for the pipeline.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub selection: TableSelection,
    /// Explicit plans, matched to enumerated tables by name.
    pub plans: Vec<TablePlan>,
    pub capacity: SheetCapacity,
    /// Upper bound on the time spent on a single table.
    pub table_timeout: Option<Duration>,
}

impl SyncOptions {
    pub fn new(selection: TableSelection) -> Self {
        Self {
            selection,
            plans: Vec::new(),
            capacity: SheetCapacity::default(),
            table_timeout: None,
        }
    }

    pub fn with_plans(mut self, plans: Vec<TablePlan>) -> Self {
        self.plans = plans;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.table_timeout = Some(timeout);
        self
    }

    /// The explicit plan for `table`, or a full replace export.
    pub fn plan_for(&self, table: &str) -> TablePlan {
        self.plans
            .iter()
            .find(|p| p.table == table)
            .cloned()
            .unwrap_or_else(|| TablePlan::full(table))
    }
}

/// Exports tables from a row source into a spreadsheet.
///
/// Handles are borrowed for the whole run and shared by every table.
pub struct SyncPipeline<'a> {
    source: &'a dyn RowSource,
    sheets: &'a dyn SheetStore,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        source: &'a dyn RowSource,
        sheets: &'a dyn SheetStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            sheets,
            options,
        }
    }

    /// Runs every table and returns their reports.
    ///
    /// Only table enumeration can fail the run as a whole; table-level
    /// errors end up in the summary.
    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary, SyncError> {
        self.run_with_progress(today, |_| {}).await
    }

    /// Like [`SyncPipeline::run`], reporting each table to `on_progress` as it
    /// starts and finishes.
    pub async fn run_with_progress<F>(
        &self,
        today: NaiveDate,
        mut on_progress: F,
    ) -> Result<RunSummary, SyncError>
    where
        F: FnMut(Progress<'_>) + Send,
    {
        let tables = enumerate_tables(self.source, &self.options.selection).await?;
        info!("Syncing {} tables for {today}.", tables.len());

        let mut summary = RunSummary::default();
        for table in tables {
            let plan = self.options.plan_for(&table);
            on_progress(Progress::Started(&table));
            let report = self.run_table(&plan, today).await;
            on_progress(Progress::Finished(&report));
            summary.outcomes.push(report);
        }
        Ok(summary)
    }

    /// Runs one table under the configured timeout.
    pub async fn run_table(&self, plan: &TablePlan, today: NaiveDate) -> TableReport {
        info!("Processing table: {}", plan.table);
        let mut stage = TableStage::Pending;

        let result = match self.options.table_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.sync_table(plan, today, &mut stage)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout {
                        table: plan.table.clone(),
                        seconds: limit.as_secs(),
                    }),
                }
            }
            None => self.sync_table(plan, today, &mut stage).await,
        };

        match result {
            Ok(outcome) => {
                info!(
                    "Synced table '{}' into '{}' ({} rows).",
                    outcome.table, outcome.worksheet, outcome.rows_written
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!("Table '{}' failed after stage '{stage}': {error}", plan.table);
                Err(TableFailure {
                    table: plan.table.clone(),
                    last_stage: stage,
                    error,
                })
            }
        }
    }

    async fn sync_table(
        &self,
        plan: &TablePlan,
        today: NaiveDate,
        stage: &mut TableStage,
    ) -> Result<TableOutcome, SyncError> {
        let title = plan.worksheet_title();

        // --- 1. Fetch ---
        let filter = plan.filter.resolve(today)?;
        let fetched = self.source.fetch(&plan.table, &filter).await?;
        *stage = TableStage::Fetched;
        let rows_fetched = fetched.len();

        // --- 2. Project ---
        let projected = project(&fetched, &plan.columns);
        *stage = TableStage::Projected;

        // --- 3. Reconcile ---
        let (records, merge): (RecordSet, Option<MergeCounts>) = match &plan.mode {
            SyncMode::Replace => (projected.records, None),
            SyncMode::Incremental(window) => {
                let existing = match self.sheets.worksheet(title).await? {
                    Some(_) => RecordSet::from_grid(self.sheets.read_rows(title).await?),
                    None => RecordSet::default(),
                };
                let merged = reconcile(&existing, &projected.records, window, today);
                *stage = TableStage::Reconciled;
                let counts = MergeCounts {
                    kept: merged.kept,
                    superseded: merged.superseded,
                    discarded: merged.discarded,
                };
                (merged.records, Some(counts))
            }
        };

        // --- 4. Write ---
        let rows_written =
            write_record_set(self.sheets, title, &records, self.options.capacity).await?;
        *stage = TableStage::Written;

        Ok(TableOutcome {
            table: plan.table.clone(),
            worksheet: title.to_string(),
            rows_fetched,
            rows_written,
            dropped_columns: projected.dropped,
            merge,
        })
    }
}
