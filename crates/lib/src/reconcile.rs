//! # Incremental Reconciliation
//!
//! Merges the rows already in a worksheet with the rows freshly fetched for
//! today. Existing rows dated today are superseded by the fresh fetch; every
//! other row is kept in its original position ahead of the fresh rows.

use crate::datetime::value_as_date;
use crate::types::{Record, RecordSet, Value};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

/// What happens to an existing row whose retention date cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparseableDatePolicy {
    /// Keep the row with the other rows outside the window.
    #[default]
    Keep,
    /// Treat the row as part of today's data and replace it.
    Supersede,
    /// Remove the row from the sheet altogether.
    Drop,
}

/// The "date column equals today" predicate used by incremental syncs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetentionWindow {
    pub column: String,
    #[serde(default)]
    pub unparseable: UnparseableDatePolicy,
}

impl RetentionWindow {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            unparseable: UnparseableDatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnparseableDatePolicy) -> Self {
        self.unparseable = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Kept,
    Superseded,
    Discarded,
}

impl RetentionWindow {
    fn classify(&self, value: Option<&Value>, today: NaiveDate) -> Disposition {
        match value.and_then(value_as_date) {
            Some(d) if d == today => Disposition::Superseded,
            Some(_) => Disposition::Kept,
            None => match self.unparseable {
                UnparseableDatePolicy::Keep => Disposition::Kept,
                UnparseableDatePolicy::Supersede => Disposition::Superseded,
                UnparseableDatePolicy::Drop => Disposition::Discarded,
            },
        }
    }
}

/// The merged rows plus how many existing rows went each way.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub records: RecordSet,
    pub kept: usize,
    pub superseded: usize,
    pub discarded: usize,
}

/// Produces `kept ++ fresh`.
///
/// Output columns are the existing header followed by any column only the
/// fresh rows carry; cells a side does not have are null. When the sheet was
/// empty the result is exactly `fresh`.
pub fn reconcile(
    existing: &RecordSet,
    fresh: &RecordSet,
    window: &RetentionWindow,
    today: NaiveDate,
) -> Reconciled {
    if existing.columns().is_empty() {
        return Reconciled {
            records: fresh.clone(),
            kept: 0,
            superseded: 0,
            discarded: 0,
        };
    }

    let date_idx = existing.column_index(&window.column);
    if date_idx.is_none() {
        warn!(
            "Retention column '{}' is missing from the existing sheet; applying the {:?} policy to every row.",
            window.column, window.unparseable
        );
    }

    let mut columns: Vec<String> = existing.columns().to_vec();
    for c in fresh.columns() {
        if !columns.contains(c) {
            columns.push(c.clone());
        }
    }

    let (mut kept, mut superseded, mut discarded) = (0, 0, 0);
    let mut rows: Vec<Record> = Vec::with_capacity(existing.len() + fresh.len());

    for row in existing.records() {
        let value = date_idx.and_then(|i| row.values.get(i));
        match window.classify(value, today) {
            Disposition::Kept => {
                kept += 1;
                rows.push(align(row, existing.columns(), &columns));
            }
            Disposition::Superseded => superseded += 1,
            Disposition::Discarded => discarded += 1,
        }
    }
    rows.extend(
        fresh
            .records()
            .iter()
            .map(|row| align(row, fresh.columns(), &columns)),
    );

    debug!(kept, superseded, discarded, fresh = fresh.len(), "Reconciled worksheet rows.");

    Reconciled {
        // `align` always produces `columns.len()` values.
        records: RecordSet::new(columns, rows).unwrap_or_default(),
        kept,
        superseded,
        discarded,
    }
}

fn align(row: &Record, from: &[String], to: &[String]) -> Record {
    Record::new(
        to.iter()
            .map(|c| {
                from.iter()
                    .position(|f| f == c)
                    .and_then(|i| row.values.get(i).cloned())
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn set(columns: &[&str], rows: Vec<Vec<Value>>) -> RecordSet {
        RecordSet::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(Record::new).collect(),
        )
        .unwrap()
    }

    fn existing() -> RecordSet {
        set(
            &["Fecha", "Monto"],
            vec![
                vec![Value::from("2026-01-29 09:00:00"), Value::from("1")],
                vec![Value::from("2026-01-30 08:00:00"), Value::from("2")],
                vec![Value::from("2026-01-31 07:00:00"), Value::from("3")],
            ],
        )
    }

    fn fresh() -> RecordSet {
        set(
            &["Fecha", "Monto"],
            vec![
                vec![Value::from("2026-01-30 10:00:00"), Value::Int(20)],
                vec![Value::from("2026-01-30 11:00:00"), Value::Int(21)],
            ],
        )
    }

    #[test]
    fn keeps_other_days_and_appends_fresh() {
        let out = reconcile(&existing(), &fresh(), &RetentionWindow::new("Fecha"), day(30));
        assert_eq!(out.kept, 2);
        assert_eq!(out.superseded, 1);
        let montos: Vec<String> = out
            .records
            .column_values("Monto")
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(montos, vec!["1", "3", "20", "21"]);
    }

    #[test]
    fn unparseable_dates_follow_policy() {
        let mut rows = existing().into_parts().1;
        rows.push(Record::new(vec![Value::from("pendiente"), Value::from("9")]));
        let existing = RecordSet::new(vec!["Fecha".into(), "Monto".into()], rows).unwrap();

        let keep = reconcile(&existing, &fresh(), &RetentionWindow::new("Fecha"), day(30));
        assert_eq!((keep.kept, keep.superseded, keep.discarded), (3, 1, 0));

        let window = RetentionWindow::new("Fecha").with_policy(UnparseableDatePolicy::Supersede);
        let sup = reconcile(&existing, &fresh(), &window, day(30));
        assert_eq!((sup.kept, sup.superseded, sup.discarded), (2, 2, 0));

        let window = RetentionWindow::new("Fecha").with_policy(UnparseableDatePolicy::Drop);
        let dropped = reconcile(&existing, &fresh(), &window, day(30));
        assert_eq!((dropped.kept, dropped.superseded, dropped.discarded), (2, 1, 1));
        assert_eq!(dropped.records.len(), 4);
    }

    #[test]
    fn empty_sheet_yields_fresh_rows() {
        let out = reconcile(
            &RecordSet::default(),
            &fresh(),
            &RetentionWindow::new("Fecha"),
            day(30),
        );
        assert_eq!(out.records, fresh());
    }

    #[test]
    fn unions_columns_with_nulls() {
        let fresh = set(
            &["Fecha", "Extra"],
            vec![vec![Value::from("2026-01-30 10:00:00"), Value::from("x")]],
        );
        let out = reconcile(&existing(), &fresh, &RetentionWindow::new("Fecha"), day(30));
        assert_eq!(out.records.columns(), &["Fecha", "Monto", "Extra"]);
        assert_eq!(out.records.get(0, "Extra"), Some(&Value::Null));
        assert_eq!(out.records.get(2, "Monto"), Some(&Value::Null));
    }

    #[test]
    fn missing_retention_column_uses_policy() {
        let existing = set(&["Monto"], vec![vec![Value::from("1")]]);
        let window = RetentionWindow::new("Fecha").with_policy(UnparseableDatePolicy::Drop);
        let out = reconcile(&existing, &fresh(), &window, day(30));
        assert_eq!(out.discarded, 1);
        assert_eq!(out.records.len(), 2);
    }
}
