use crate::{
    errors::SyncError,
    providers::db::storage::{build_fetch_query, Dialect, RowFilter, RowSource},
    types::{Record, RecordSet, Value},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind},
    Column, Executor, Row, TypeInfo, ValueRef,
};
use std::{
    fmt::{self, Debug},
    time::Duration,
};
use tracing::{debug, info};

const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

/// A row source backed by a Postgres (Supabase) database.
///
/// The pool connects lazily: nothing touches the network until the first
/// query, so a dead database surfaces as a per-table fetch failure.
#[derive(Clone)]
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub fn connect_lazy(db_url: &str, acquire_timeout: Duration) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(db_url)
            .map_err(|e| SyncError::Config(format!("Invalid database URL: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Debug for PostgresSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSource").finish_non_exhaustive()
    }
}

/// Built-in and extension types whose wire format is plain text.
fn is_text_type_name(name: &str) -> bool {
    ["TEXT", "VARCHAR", "BPCHAR", "NAME", "CITEXT", "UNKNOWN"]
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name))
}

fn decodes_as_text(info: &PgTypeInfo) -> bool {
    is_text_type_name(info.name()) || matches!(info.kind(), PgTypeKind::Enum(_))
}

/// Decodes one field by its Postgres type. Types without a mapping
/// (arrays, `bytea`, `interval`, `inet`, ...) are an error, stored as null.
fn decode_field(row: &PgRow, idx: usize, info: &PgTypeInfo) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    let value = match info.name() {
        "BOOL" => Value::Bool(row.try_get(idx)?),
        "INT2" => Value::Int(row.try_get::<i16, _>(idx)?.into()),
        "INT4" => Value::Int(row.try_get::<i32, _>(idx)?.into()),
        "INT8" => Value::Int(row.try_get(idx)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(idx)?.into()),
        "FLOAT8" => Value::Float(row.try_get(idx)?),
        "NUMERIC" => {
            let text = row.try_get::<sqlx::types::Decimal, _>(idx)?.to_string();
            text.parse::<f64>().map(Value::Float).unwrap_or(Value::Text(text))
        }
        "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?.naive_utc()),
        "DATE" => Value::Date(row.try_get::<NaiveDate, _>(idx)?),
        "TIME" => Value::Text(row.try_get::<NaiveTime, _>(idx)?.to_string()),
        "UUID" => Value::Text(row.try_get::<sqlx::types::Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => Value::Text(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        // Text-like types and user-defined enums share the text wire format.
        _ if decodes_as_text(info) => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
        other => {
            return Err(sqlx::Error::Decode(
                format!("no text mapping for type {other}").into(),
            ))
        }
    };
    Ok(value)
}

fn row_to_record(table: &str, row: &PgRow) -> Record {
    Record::new(
        row.columns()
            .iter()
            .map(|col| {
                let info = col.type_info();
                decode_field(row, col.ordinal(), info).unwrap_or_else(|e| {
                    debug!(
                        table = %table,
                        column = %col.name(),
                        "Could not decode {} value, storing null: {e}",
                        info.name()
                    );
                    Value::Null
                })
            })
            .collect(),
    )
}

#[async_trait]
impl RowSource for PostgresSource {
    fn name(&self) -> &str {
        "Postgres"
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, SyncError> {
        info!("Listing base tables in schema '{schema}'.");
        let tables: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SyncError::CatalogUnavailable(e.to_string()))?;
        Ok(tables.into_iter().map(|(name,)| name).collect())
    }

    async fn fetch(&self, table: &str, filter: &RowFilter) -> Result<RecordSet, SyncError> {
        let query = build_fetch_query(Dialect::Postgres, table, filter);
        debug!(sql = %query.sql, param = ?query.param, "--> Executing Postgres fetch");

        // The connection goes back to the pool when `conn` drops, on every path.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| SyncError::fetch(table, e))?;

        let mut statement = sqlx::query(&query.sql);
        if let Some(param) = &query.param {
            statement = statement.bind(param.clone());
        }
        let rows = statement
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| SyncError::fetch(table, e))?;

        let columns: Vec<String> = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            None => (&mut *conn)
                .describe(&query.sql)
                .await
                .map_err(|e| SyncError::fetch(table, e))?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };

        let records = rows.iter().map(|row| row_to_record(table, row)).collect();
        RecordSet::new(columns, records)
    }
}
