use crate::datetime::{value_as_date, value_as_datetime};
use crate::errors::SyncError;
use crate::types::{Record, RecordSet};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dyn_clone::DynClone;
use std::fmt::Debug;

/// Which rows of a table to export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowFilter {
    /// Every row, in database order.
    #[default]
    All,
    /// Rows with `column >= cutoff`, newest first.
    Since {
        column: String,
        cutoff: NaiveDateTime,
    },
    /// Rows whose `column`, truncated to a date, equals `day`.
    OnDay { column: String, day: NaiveDate },
}

impl RowFilter {
    /// Evaluates the filter against one row of `records`.
    ///
    /// Rows whose filter column is missing or unparseable never match.
    pub fn matches(&self, records: &RecordSet, row: usize) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Since { column, cutoff } => records
                .get(row, column)
                .and_then(value_as_datetime)
                .is_some_and(|ts| ts >= *cutoff),
            RowFilter::OnDay { column, day } => records
                .get(row, column)
                .and_then(value_as_date)
                .is_some_and(|d| d == *day),
        }
    }

    /// Applies the filter and its ordering to an in-memory record set.
    pub fn apply(&self, records: &RecordSet) -> RecordSet {
        let mut rows: Vec<Record> = (0..records.len())
            .filter(|i| self.matches(records, *i))
            .map(|i| records.records()[i].clone())
            .collect();
        if let RowFilter::Since { column, .. } = self {
            if let Some(idx) = records.column_index(column) {
                rows.sort_by(|a, b| {
                    value_as_datetime(&b.values[idx]).cmp(&value_as_datetime(&a.values[idx]))
                });
            }
        }
        RecordSet::new(records.columns().to_vec(), rows).unwrap_or_default()
    }
}

/// SQL dialects the query builder knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Quotes an identifier, preserving case and doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A query with its single optional bound parameter rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub sql: String,
    pub param: Option<String>,
}

/// Builds the fetch statement for `table` under `filter`.
pub fn build_fetch_query(dialect: Dialect, table: &str, filter: &RowFilter) -> FetchQuery {
    let table = quote_ident(table);
    let placeholder = match dialect {
        Dialect::Postgres => "$1",
        Dialect::Sqlite => "?",
    };
    match filter {
        RowFilter::All => FetchQuery {
            sql: format!("SELECT * FROM {table}"),
            param: None,
        },
        RowFilter::Since { column, cutoff } => {
            let col = quote_ident(column);
            // SQLite stores timestamps as text in more than one layout, so both
            // sides go through `datetime()` before comparing or sorting.
            let (key, bound) = match dialect {
                Dialect::Postgres => (col, format!("CAST({placeholder} AS timestamp)")),
                Dialect::Sqlite => (format!("datetime({col})"), format!("datetime({placeholder})")),
            };
            FetchQuery {
                sql: format!("SELECT * FROM {table} WHERE {key} >= {bound} ORDER BY {key} DESC"),
                param: Some(cutoff.format("%Y-%m-%d %H:%M:%S").to_string()),
            }
        }
        RowFilter::OnDay { column, day } => {
            let col = quote_ident(column);
            let predicate = match dialect {
                Dialect::Postgres => format!("CAST({col} AS date) = CAST({placeholder} AS date)"),
                Dialect::Sqlite => format!("date({col}) = {placeholder}"),
            };
            FetchQuery {
                sql: format!("SELECT * FROM {table} WHERE {predicate}"),
                param: Some(day.format("%Y-%m-%d").to_string()),
            }
        }
    }
}

/// A source of table rows.
///
/// Implementations must release any connection they acquire before returning,
/// so that a failure on one table cannot leak into the next.
#[async_trait]
pub trait RowSource: Send + Sync + DynClone + Debug {
    /// Returns the name of the source (e.g., "Postgres", "SQLite").
    fn name(&self) -> &str;

    /// Lists the base tables of `schema` in catalog order.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, SyncError>;

    /// Fetches the rows of `table` selected by `filter`.
    async fn fetch(&self, table: &str, filter: &RowFilter) -> Result<RecordSet, SyncError>;
}

dyn_clone::clone_trait_object!(RowSource);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(u64::from(d) - 1))
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn postgres_cutoff_query() {
        let q = build_fetch_query(
            Dialect::Postgres,
            "Ingreso",
            &RowFilter::Since {
                column: "created".into(),
                cutoff: ts(30),
            },
        );
        assert_eq!(
            q.sql,
            "SELECT * FROM \"Ingreso\" WHERE \"created\" >= CAST($1 AS timestamp) ORDER BY \"created\" DESC"
        );
        assert_eq!(q.param.as_deref(), Some("2026-01-30 00:00:00"));
    }

    #[test]
    fn sqlite_cutoff_query_normalises_timestamps() {
        let q = build_fetch_query(
            Dialect::Sqlite,
            "Ingreso",
            &RowFilter::Since {
                column: "created".into(),
                cutoff: ts(30),
            },
        );
        assert_eq!(
            q.sql,
            "SELECT * FROM \"Ingreso\" WHERE datetime(\"created\") >= datetime(?) ORDER BY datetime(\"created\") DESC"
        );
    }

    #[test]
    fn sqlite_day_query() {
        let q = build_fetch_query(
            Dialect::Sqlite,
            "Ventas",
            &RowFilter::OnDay {
                column: "fecha".into(),
                day: NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
            },
        );
        assert_eq!(q.sql, "SELECT * FROM \"Ventas\" WHERE date(\"fecha\") = ?");
        assert_eq!(q.param.as_deref(), Some("2026-01-30"));
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(
            build_fetch_query(Dialect::Postgres, "Inventario", &RowFilter::All).sql,
            "SELECT * FROM \"Inventario\""
        );
    }

    #[test]
    fn in_memory_cutoff_is_inclusive_and_descending() {
        let records = RecordSet::new(
            vec!["created".into()],
            vec![
                Record::new(vec![Value::Timestamp(ts(29))]),
                Record::new(vec![Value::Timestamp(ts(30))]),
                Record::new(vec![Value::Timestamp(ts(32))]),
            ],
        )
        .unwrap();
        let out = RowFilter::Since {
            column: "created".into(),
            cutoff: ts(30),
        }
        .apply(&records);
        let got: Vec<&Value> = out.column_values("created").unwrap();
        assert_eq!(got, vec![&Value::Timestamp(ts(32)), &Value::Timestamp(ts(30))]);
    }
}
