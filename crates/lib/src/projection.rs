//! # Column Projection
//!
//! Reshapes a fetched `RecordSet` into the destination column set. The policy
//! is best effort: declared columns missing from the data are skipped and
//! reported, never padded with nulls and never treated as an error.
//!
//! Projecting an already projected set returns it unchanged. A set whose
//! columns are all declared destinations, in declared order, counts as
//! projected: its columns are looked up by destination name.

use crate::constants::TIMESTAMP_FORMAT;
use crate::datetime::format_timestamp;
use crate::types::{Record, RecordSet, Value};
use chrono::format::{parse, Parsed, StrftimeItems};
use serde::Deserialize;
use tracing::warn;

/// How a source value is turned into a destination value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Identity,
    /// Parses the value as a timestamp and renders it with `pattern`.
    FormatTimestamp {
        #[serde(default = "default_timestamp_pattern")]
        pattern: String,
    },
}

fn default_timestamp_pattern() -> String {
    TIMESTAMP_FORMAT.to_string()
}

impl Transform {
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Transform::Identity => value.clone(),
            Transform::FormatTimestamp { pattern } => match value {
                Value::Text(s) if matches_pattern(s, pattern) => value.clone(),
                _ => format_timestamp(value, pattern),
            },
        }
    }
}

/// True when `text` reads back cleanly under the strftime `pattern`.
fn matches_pattern(text: &str, pattern: &str) -> bool {
    let mut parsed = Parsed::new();
    parse(&mut parsed, text, StrftimeItems::new(pattern)).is_ok()
}

/// One destination column, optionally read from a differently named source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRule {
    pub destination: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub transform: Transform,
}

impl ColumnRule {
    pub fn keep(name: &str) -> Self {
        Self {
            destination: name.to_string(),
            source: None,
            transform: Transform::Identity,
        }
    }

    pub fn rename(source: &str, destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            source: Some(source.to_string()),
            transform: Transform::Identity,
        }
    }

    /// Renames `source` to `destination`, rendering it as `YYYY-MM-DD HH:MM:SS`.
    pub fn timestamp(source: &str, destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            source: Some(source.to_string()),
            transform: Transform::FormatTimestamp {
                pattern: default_timestamp_pattern(),
            },
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.destination)
    }

    fn resolve(&self, records: &RecordSet, projected: bool) -> Option<usize> {
        if projected {
            return records.column_index(&self.destination);
        }
        records
            .column_index(self.source_name())
            .or_else(|| records.column_index(&self.destination))
    }
}

/// A declared, ordered list of destination columns.
///
/// An empty projection passes records through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct ColumnProjection {
    pub rules: Vec<ColumnRule>,
}

impl ColumnProjection {
    pub fn new(rules: Vec<ColumnRule>) -> Self {
        Self { rules }
    }

    pub fn is_passthrough(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `records` already has the destination shape: every column is a
    /// declared destination and they follow declaration order.
    pub fn is_projected(&self, records: &RecordSet) -> bool {
        let mut last = None;
        !records.columns().is_empty()
            && records.columns().iter().all(|column| {
                let position = self.rules.iter().position(|r| &r.destination == column);
                match position {
                    Some(p) if last.map_or(true, |l| p > l) => {
                        last = Some(p);
                        true
                    }
                    _ => false,
                }
            })
    }
}

/// The output of a projection plus the declared columns it had to skip.
#[derive(Debug, Clone, PartialEq)]
pub struct Projected {
    pub records: RecordSet,
    pub dropped: Vec<String>,
}

/// Projects `records` onto `projection`.
pub fn project(records: &RecordSet, projection: &ColumnProjection) -> Projected {
    if projection.is_passthrough() {
        return Projected {
            records: records.clone(),
            dropped: Vec::new(),
        };
    }

    let projected = projection.is_projected(records);
    let mut selected: Vec<(&ColumnRule, usize)> = Vec::with_capacity(projection.rules.len());
    let mut dropped = Vec::new();
    for rule in &projection.rules {
        if selected.iter().any(|(r, _)| r.destination == rule.destination) {
            continue;
        }
        match rule.resolve(records, projected) {
            Some(idx) => selected.push((rule, idx)),
            None => dropped.push(rule.destination.clone()),
        }
    }

    if !dropped.is_empty() {
        warn!(
            "Declared columns not present in the data were skipped: {}",
            dropped.join(", ")
        );
    }

    let columns = selected
        .iter()
        .map(|(rule, _)| rule.destination.clone())
        .collect();
    let rows = records
        .records()
        .iter()
        .map(|row| {
            Record::new(
                selected
                    .iter()
                    .map(|(rule, idx)| rule.transform.apply(&row.values[*idx]))
                    .collect(),
            )
        })
        .collect();

    Projected {
        // Every row is built from `selected`, so widths always match.
        records: RecordSet::new(columns, rows).unwrap_or_default(),
        dropped,
    }
}
