use crate::{
    errors::SyncError,
    providers::db::storage::{build_fetch_query, Dialect, RowFilter, RowSource},
    types::{Record, RecordSet, Value},
};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use tracing::{debug, info};
use turso::{Database, Value as TursoValue};

pub mod sql;

/// A row source backed by a local SQLite database through Turso.
///
/// SQLite stores timestamps as text, so temporal filters compare the ISO
/// strings directly and date truncation goes through `date()`.
#[derive(Clone)]
pub struct SqliteSource {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
}

impl SqliteSource {
    /// Opens a file path, or a fresh isolated database for `":memory:"`.
    pub async fn new(db_path: &str) -> Result<Self, SyncError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| {
                SyncError::Config(format!("Failed to open SQLite database '{db_path}': {e}"))
            })?;
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Executes a batch of `;`-separated statements, mainly to seed fixtures.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SyncError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ())
                .await
                .map_err(|e| SyncError::Config(format!("Statement failed: {e}")))?;
        }
        Ok(())
    }
}

impl Debug for SqliteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSource").finish_non_exhaustive()
    }
}

fn turso_value_to_value(v: TursoValue) -> Value {
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Int(i),
        TursoValue::Real(f) => Value::Float(f),
        TursoValue::Text(s) => Value::Text(s),
        TursoValue::Blob(_) => Value::Null,
    }
}

#[async_trait]
impl RowSource for SqliteSource {
    fn name(&self) -> &str {
        "SQLite"
    }

    /// SQLite has no schemas; every user table is listed regardless of `schema`.
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, SyncError> {
        info!("Listing all tables in SQLite database.");
        let conn = self
            .db
            .connect()
            .map_err(|e| SyncError::CatalogUnavailable(e.to_string()))?;
        let mut rows = conn
            .query(sql::LIST_TABLES, ())
            .await
            .map_err(|e| SyncError::CatalogUnavailable(e.to_string()))?;

        let mut tables = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| SyncError::CatalogUnavailable(e.to_string()))?
        {
            if let Ok(TursoValue::Text(name)) = row.get_value(0) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    async fn fetch(&self, table: &str, filter: &RowFilter) -> Result<RecordSet, SyncError> {
        let query = build_fetch_query(Dialect::Sqlite, table, filter);
        debug!(sql = %query.sql, "--> Executing SQLite fetch");

        let conn = self.db.connect().map_err(|e| SyncError::fetch(table, e))?;
        let mut stmt = conn
            .prepare(&query.sql)
            .await
            .map_err(|e| SyncError::fetch(table, e))?;

        let column_names: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let params: Vec<TursoValue> = query.param.into_iter().map(TursoValue::Text).collect();
        let mut rows = stmt
            .query(params)
            .await
            .map_err(|e| SyncError::fetch(table, e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| SyncError::fetch(table, e))? {
            let values = (0..column_names.len())
                .map(|i| row.get_value(i).map(turso_value_to_value).unwrap_or(Value::Null))
                .collect();
            records.push(Record::new(values));
        }

        RecordSet::new(column_names, records)
    }
}
