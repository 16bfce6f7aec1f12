//! # Table Plans
//!
//! Declarative description of what to export per table: which rows, which
//! columns, and whether the worksheet is replaced or merged incrementally.

use crate::constants::DEFAULT_SCHEMA;
use crate::datetime::parse_lenient_datetime;
use crate::errors::SyncError;
use crate::projection::ColumnProjection;
use crate::providers::db::RowFilter;
use crate::reconcile::RetentionWindow;
use chrono::{Days, NaiveDate};
use serde::Deserialize;

/// Where the list of tables to export comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSelection {
    /// A fixed, ordered list of table names.
    Static { tables: Vec<String> },
    /// Every base table of `schema`, narrowed by anchored regex patterns.
    Catalog {
        #[serde(default = "default_schema")]
        schema: String,
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

/// Row selection as written in configuration. Resolved against the run date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    #[default]
    All,
    /// Inclusive lower bound on a timestamp column, newest rows first.
    Since { column: String, cutoff: String },
    /// Like `Since`, with the cutoff at midnight `days` before the run date.
    SinceDaysAgo { column: String, days: u64 },
    /// Rows whose date part equals the run date.
    Today { column: String },
}

impl FilterSpec {
    pub fn resolve(&self, today: NaiveDate) -> Result<RowFilter, SyncError> {
        let filter = match self {
            FilterSpec::All => RowFilter::All,
            FilterSpec::Since { column, cutoff } => RowFilter::Since {
                column: column.clone(),
                cutoff: parse_lenient_datetime(cutoff).ok_or_else(|| {
                    SyncError::Config(format!("Unparseable cutoff '{cutoff}' for column '{column}'"))
                })?,
            },
            FilterSpec::SinceDaysAgo { column, days } => {
                let day = today.checked_sub_days(Days::new(*days)).ok_or_else(|| {
                    SyncError::Config(format!("Cutoff of {days} days is out of range"))
                })?;
                RowFilter::Since {
                    column: column.clone(),
                    cutoff: day.and_time(chrono::NaiveTime::MIN),
                }
            }
            FilterSpec::Today { column } => RowFilter::OnDay {
                column: column.clone(),
                day: today,
            },
        };
        Ok(filter)
    }
}

/// Replace the worksheet, or merge today's rows into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Replace,
    Incremental(RetentionWindow),
}

/// Everything the pipeline needs to export one table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TablePlan {
    pub table: String,
    /// Destination worksheet title; defaults to the table name.
    #[serde(default)]
    pub worksheet: Option<String>,
    #[serde(default)]
    pub filter: FilterSpec,
    #[serde(default)]
    pub columns: ColumnProjection,
    #[serde(default)]
    pub mode: SyncMode,
}

impl TablePlan {
    /// Full fetch, every column, worksheet replaced.
    pub fn full(table: &str) -> Self {
        Self {
            table: table.to_string(),
            worksheet: None,
            filter: FilterSpec::All,
            columns: ColumnProjection::default(),
            mode: SyncMode::Replace,
        }
    }

    pub fn worksheet_title(&self) -> &str {
        self.worksheet.as_deref().unwrap_or(&self.table)
    }
}
