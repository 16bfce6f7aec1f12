//! # `sheetsync` CLI Library
//!
//! Wires configuration, the row source and the Google Sheets client into a
//! `SyncPipeline` and prints a line per table as the run advances.

pub mod config;
pub mod source;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use sheetsync::pipeline::{Progress, RunSummary};
use sheetsync::SyncPipeline;
use sheetsync_sheets::{spreadsheet_id, GoogleSheetsClient};
use std::time::Duration;
use tracing::info;

use crate::config::get_config;
use crate::source::connect_source;

#[derive(Parser, Debug)]
#[command(author, version, about = "Copies database tables into a Google Sheets spreadsheet", long_about = None)]
pub struct Cli {
    /// Path to a YAML config file. Defaults to `./sheetsync.yml` when present.
    #[arg(long, env = "SHEETSYNC_CONFIG")]
    pub config: Option<String>,
    /// The date treated as "today" by incremental syncs (YYYY-MM-DD).
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

/// The stdout line for a progress event.
pub fn progress_line(progress: &Progress<'_>) -> String {
    match progress {
        Progress::Started(table) => format!("🔄 Procesando tabla: {table}..."),
        Progress::Finished(Ok(outcome)) => format!(
            "✅ Sincronizada con éxito: {} ({} filas)",
            outcome.table, outcome.rows_written
        ),
        Progress::Finished(Err(failure)) => {
            format!("❌ Error en tabla {}: {}", failure.table, failure.error)
        }
    }
}

/// The closing stdout line of a run.
pub fn summary_line(summary: &RunSummary) -> String {
    let succeeded = summary.succeeded().count();
    format!(
        "Resumen: {succeeded}/{} tablas sincronizadas, {} filas escritas.",
        summary.outcomes.len(),
        summary.total_rows()
    )
}

/// Runs one sync. Table failures are reported but do not fail the run; only
/// configuration and catalog errors do.
pub async fn run(cli: Cli) -> Result<()> {
    let config = get_config(cli.config.as_deref())?;
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    let db_url = config.db_url()?;
    let source = connect_source(db_url, Duration::from_secs(config.connect_timeout_secs))
        .await
        .context("Failed to open the row source")?;

    let sheet_id = spreadsheet_id(&config.spreadsheet_id)?;
    info!("Exporting into spreadsheet '{sheet_id}'.");
    let sheets = GoogleSheetsClient::new(sheet_id, config.google_auth()?)?
        .with_api_base(config.sheets_api_base.clone());

    let pipeline = SyncPipeline::new(&*source, &sheets, config.sync_options());
    let summary = pipeline
        .run_with_progress(today, |progress| println!("{}", progress_line(&progress)))
        .await?;

    println!("{}", summary_line(&summary));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsync::pipeline::{TableFailure, TableOutcome, TableStage};
    use sheetsync::SyncError;

    fn outcome(table: &str, rows: usize) -> TableOutcome {
        TableOutcome {
            table: table.into(),
            worksheet: table.into(),
            rows_fetched: rows,
            rows_written: rows,
            dropped_columns: vec![],
            merge: None,
        }
    }

    #[test]
    fn formats_progress_lines() {
        assert_eq!(
            progress_line(&Progress::Started("Ingreso")),
            "🔄 Procesando tabla: Ingreso..."
        );
        assert_eq!(
            progress_line(&Progress::Finished(&Ok(outcome("Ingreso", 3)))),
            "✅ Sincronizada con éxito: Ingreso (3 filas)"
        );
        let failed = Err(TableFailure {
            table: "Inventario".into(),
            last_stage: TableStage::Pending,
            error: SyncError::fetch("Inventario", "relation does not exist"),
        });
        assert_eq!(
            progress_line(&Progress::Finished(&failed)),
            "❌ Error en tabla Inventario: Failed to fetch rows from table 'Inventario': relation does not exist"
        );
    }

    #[test]
    fn summarises_run() {
        let summary = RunSummary {
            outcomes: vec![
                Ok(outcome("Ingreso", 3)),
                Err(TableFailure {
                    table: "Inventario".into(),
                    last_stage: TableStage::Fetched,
                    error: SyncError::write("Inventario", "quota"),
                }),
            ],
        };
        assert_eq!(
            summary_line(&summary),
            "Resumen: 1/2 tablas sincronizadas, 3 filas escritas."
        );
    }

    #[test]
    fn parses_today_flag() {
        let cli = Cli::parse_from(["sheetsync", "--today", "2026-01-30"]);
        assert_eq!(cli.today, NaiveDate::from_ymd_opt(2026, 1, 30));
        assert!(Cli::try_parse_from(["sheetsync", "--today", "30/01/2026"]).is_err());
    }
}
