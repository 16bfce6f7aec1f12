//! # Application Configuration
//!
//! Loads `AppConfig` from layered sources: programmatic defaults, an optional
//! `sheetsync.yml` (with `${VAR}` substitution), plain environment variables
//! such as `DB_URL`, and `SHEETSYNC_`-prefixed overrides.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use sheetsync::constants::{
    DEFAULT_SHEET_COLUMNS, DEFAULT_SHEET_ROWS, DEFAULT_SPREADSHEET_ID, DEFAULT_TABLES,
};
use sheetsync::pipeline::{SheetCapacity, TablePlan, TableSelection};
use sheetsync::SyncOptions;
use sheetsync_sheets::{parse_service_account_key, GoogleAuth, DEFAULT_API_BASE};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "sheetsync.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Missing setting: {0}")]
    Missing(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The resolved configuration of one `sheetsync` run.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Postgres connection string, or a SQLite path. Loaded from `DB_URL`.
    #[serde(default)]
    pub db_url: Option<String>,
    /// Spreadsheet ID or URL. Loaded from `SPREADSHEET_ID`.
    pub spreadsheet_id: String,
    /// Service-account JSON, inline or as a file path. Loaded from `GOOGLE_CREDENTIALS`.
    #[serde(default)]
    pub google_credentials: Option<String>,
    /// A ready bearer token. Loaded from `GOOGLE_ACCESS_TOKEN`.
    #[serde(default)]
    pub google_access_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub sheets_api_base: String,

    /// Which tables to export. Defaults to the planned tables, or the
    /// built-in list when no plan is configured.
    #[serde(default)]
    pub selection: Option<TableSelection>,
    #[serde(default)]
    pub plans: Vec<TablePlan>,

    pub sheet_rows: u32,
    pub sheet_columns: u32,
    #[serde(default)]
    pub table_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn db_url(&self) -> Result<&str, ConfigError> {
        non_empty(&self.db_url).ok_or_else(|| {
            ConfigError::Missing("DB_URL must name a Postgres database or a SQLite file.".into())
        })
    }

    /// Tables to export when `selection` is not configured.
    pub fn selection(&self) -> TableSelection {
        if let Some(selection) = &self.selection {
            return selection.clone();
        }
        let tables = if self.plans.is_empty() {
            DEFAULT_TABLES.iter().map(|t| t.to_string()).collect()
        } else {
            self.plans.iter().map(|p| p.table.clone()).collect()
        };
        TableSelection::Static { tables }
    }

    pub fn sync_options(&self) -> SyncOptions {
        let mut options = SyncOptions::new(self.selection()).with_plans(self.plans.clone());
        options.capacity = SheetCapacity {
            rows: self.sheet_rows,
            columns: self.sheet_columns,
        };
        if let Some(secs) = self.table_timeout_secs {
            options = options.with_timeout(Duration::from_secs(secs));
        }
        options
    }

    /// Picks the Sheets credentials: an explicit access token wins over a
    /// service-account key.
    pub fn google_auth(&self) -> Result<GoogleAuth, ConfigError> {
        if let Some(token) = non_empty(&self.google_access_token) {
            return Ok(GoogleAuth::Static(token.to_string()));
        }
        let credentials = non_empty(&self.google_credentials).ok_or_else(|| {
            ConfigError::Missing("Set GOOGLE_CREDENTIALS or GOOGLE_ACCESS_TOKEN.".into())
        })?;

        let json = if credentials.starts_with('{') {
            credentials.to_string()
        } else {
            info!("Reading service-account key from '{credentials}'.");
            fs::read_to_string(credentials).map_err(|e| {
                ConfigError::General(format!("Failed to read credentials file '{credentials}': {e}"))
            })?
        };
        let key = parse_service_account_key(&json)
            .map_err(|e| ConfigError::General(e.to_string()))?;
        Ok(GoogleAuth::service_account(key))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sheet_rows == 0 || self.sheet_columns == 0 {
            return Err(ConfigError::General(
                "sheet_rows and sheet_columns must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Reads a file and replaces `${VAR}` with the value of that environment
/// variable (empty when unset). Returns `Ok(None)` if the file does not exist.
pub fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.to_string()))
}

/// Loads the configuration.
///
/// `config_path_override` must exist when given; otherwise `sheetsync.yml` in
/// the working directory is used if present.
/// - Top-level keys are overridden by plain variables (`DB_URL`, `SPREADSHEET_ID`).
/// - Any key is overridden by `SHEETSYNC_...` variables, nested with `__`
///   (e.g. `SHEETSYNC_TABLE_TIMEOUT_SECS=30`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    // Layer 1: Programmatic defaults.
    let mut builder = ConfigBuilder::builder()
        .set_default("spreadsheet_id", DEFAULT_SPREADSHEET_ID)?
        .set_default("sheet_rows", i64::from(DEFAULT_SHEET_ROWS))?
        .set_default("sheet_columns", i64::from(DEFAULT_SHEET_COLUMNS))?
        .set_default("connect_timeout_secs", 10_i64)?;

    // Layer 2: Optional YAML file.
    let path = config_path_override.unwrap_or(DEFAULT_CONFIG_FILE);
    match read_and_substitute(path)? {
        Some(content) => {
            info!("Loading configuration from '{path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path_override.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{path}'."
            )));
        }
        None => info!("No '{path}' found; using defaults and environment."),
    }

    let settings = builder
        // Layer 3: Plain environment variables for top-level keys like DB_URL.
        .add_source(Environment::default())
        // Layer 4: Prefixed environment variables for everything else.
        .add_source(
            Environment::with_prefix("SHEETSYNC")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
