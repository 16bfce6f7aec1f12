//! # Configuration Tests
//!
//! Environment variables are process-global, so every test here runs under
//! `#[serial]` and starts from a cleared set of the variables `get_config` reads.

use serial_test::serial;
use sheetsync::pipeline::{FilterSpec, SyncMode, TableSelection};
use sheetsync::{ColumnRule, RetentionWindow, UnparseableDatePolicy};
use sheetsync_cli::config::{get_config, ConfigError};
use sheetsync_sheets::GoogleAuth;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const VARS: &[&str] = &[
    "DB_URL",
    "SPREADSHEET_ID",
    "GOOGLE_CREDENTIALS",
    "GOOGLE_ACCESS_TOKEN",
    "SHEETSYNC_SHEET_ROWS",
    "SHEETSYNC_TABLE_TIMEOUT_SECS",
    "SYNC_TEST_DB",
];

fn clear_env_vars() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn write_config(dir: &tempfile::TempDir, yaml: &str) -> String {
    let path = dir.path().join("sheetsync.yml");
    fs::write(&path, yaml).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
#[serial]
fn test_defaults_without_file() {
    clear_env_vars();

    let config = get_config(None).expect("defaults should load");

    assert_eq!(config.spreadsheet_id, "1MhtXjziojWiYjLRbYkmfrd-Dt2vsie102n6_CUFteFg");
    assert_eq!((config.sheet_rows, config.sheet_columns), (100, 20));
    assert_eq!(config.table_timeout_secs, None);
    assert_eq!(
        config.selection(),
        TableSelection::Static {
            tables: vec!["Ingreso".into(), "Inventario".into()]
        }
    );
    assert!(matches!(config.db_url(), Err(ConfigError::Missing(_))));
    assert!(matches!(config.google_auth(), Err(ConfigError::Missing(_))));
}

#[test]
#[serial]
fn test_yaml_plans_with_substitution() {
    clear_env_vars();
    env::set_var("SYNC_TEST_DB", "sqlite::memory:");
    let dir = tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
db_url: ${SYNC_TEST_DB}
table_timeout_secs: 30
plans:
  - table: Ingreso
    filter: { kind: since_days_ago, column: created_at, days: 7 }
    columns:
      - { destination: Fecha, source: created_at, transform: { kind: format_timestamp } }
      - { destination: monto }
    mode: { kind: incremental, column: Fecha, unparseable: drop }
  - table: Inventario
    worksheet: Stock
"#,
    );

    let config = get_config(Some(&path)).expect("config should load");

    assert_eq!(config.db_url().unwrap(), "sqlite::memory:");
    assert_eq!(
        config.selection(),
        TableSelection::Static {
            tables: vec!["Ingreso".into(), "Inventario".into()]
        }
    );

    let ingreso = &config.plans[0];
    assert_eq!(
        ingreso.filter,
        FilterSpec::SinceDaysAgo {
            column: "created_at".into(),
            days: 7
        }
    );
    assert_eq!(
        ingreso.columns.rules,
        vec![ColumnRule::timestamp("created_at", "Fecha"), ColumnRule::keep("monto")]
    );
    assert_eq!(
        ingreso.mode,
        SyncMode::Incremental(
            RetentionWindow::new("Fecha").with_policy(UnparseableDatePolicy::Drop)
        )
    );
    assert_eq!(config.plans[1].worksheet_title(), "Stock");

    let options = config.sync_options();
    assert_eq!(options.table_timeout, Some(Duration::from_secs(30)));
    assert_eq!(options.plan_for("Inventario").worksheet_title(), "Stock");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env_vars();
    let dir = tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
db_url: postgres://from-file/db
sheet_rows: 500
selection: { kind: catalog, exclude: [".*_backup"] }
"#,
    );
    env::set_var("DB_URL", "postgres://from-env/db");
    env::set_var("SPREADSHEET_ID", "https://docs.google.com/spreadsheets/d/abc-123/edit");
    env::set_var("SHEETSYNC_SHEET_ROWS", "250");

    let config = get_config(Some(&path)).expect("config should load");

    assert_eq!(config.db_url().unwrap(), "postgres://from-env/db");
    assert_eq!(config.sheet_rows, 250);
    assert_eq!(
        sheetsync_sheets::spreadsheet_id(&config.spreadsheet_id).unwrap(),
        "abc-123"
    );
    assert_eq!(
        config.selection(),
        TableSelection::Catalog {
            schema: "public".into(),
            include: vec![],
            exclude: vec![".*_backup".into()],
        }
    );
    clear_env_vars();
}

#[test]
#[serial]
fn test_example_file_loads_with_defaults() {
    clear_env_vars();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/sheetsync.example.yml");

    let config = get_config(Some(path)).expect("example config should load");

    assert_eq!(config.spreadsheet_id, "1MhtXjziojWiYjLRbYkmfrd-Dt2vsie102n6_CUFteFg");
    assert_eq!(config.table_timeout_secs, Some(120));
    assert_eq!(config.plans.len(), 2);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();
    let err = get_config(Some("/definitely/not/here/sheetsync.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
#[serial]
fn test_zero_capacity_is_rejected() {
    clear_env_vars();
    let dir = tempdir().unwrap();
    let path = write_config(&dir, "sheet_columns: 0\n");
    assert!(matches!(
        get_config(Some(&path)),
        Err(ConfigError::General(_))
    ));
}

#[test]
#[serial]
fn test_credentials_resolution() {
    clear_env_vars();
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("key.json");
    fs::write(
        &key_path,
        r#"{"client_email": "sync@x.iam.gserviceaccount.com", "private_key": "pem"}"#,
    )
    .unwrap();

    env::set_var("GOOGLE_CREDENTIALS", key_path.to_string_lossy().as_ref());
    let config = get_config(None).unwrap();
    assert!(matches!(config.google_auth(), Ok(GoogleAuth::ServiceAccount(_))));

    env::set_var("GOOGLE_ACCESS_TOKEN", "ya29.manual");
    let config = get_config(None).unwrap();
    assert!(matches!(config.google_auth(), Ok(GoogleAuth::Static(t)) if t == "ya29.manual"));

    env::remove_var("GOOGLE_ACCESS_TOKEN");
    env::set_var("GOOGLE_CREDENTIALS", "{not json");
    let config = get_config(None).unwrap();
    assert!(matches!(config.google_auth(), Err(ConfigError::General(_))));
    clear_env_vars();
}
