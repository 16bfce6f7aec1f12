//! # Record Model
//!
//! Rows travel through the pipeline as a `RecordSet`: one shared, ordered list
//! of column names plus a list of `Record`s whose values line up with it.

use crate::constants::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::errors::SyncError;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt;

/// A single cell as sent to or read from the spreadsheet API.
pub type CellValue = JsonValue;

/// A scalar value held by one column of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value into the cell representation written to a sheet.
    pub fn to_cell(&self) -> CellValue {
        match self {
            Value::Null => JsonValue::String(String::new()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(String::new())),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            Value::Timestamp(ts) => JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    /// Reads a cell returned by the spreadsheet API back into a value.
    ///
    /// Numbers and booleans keep their type so rows that are read and written
    /// again come out unchanged. Empty strings are null.
    pub fn from_cell(cell: CellValue) -> Self {
        match cell {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) if s.is_empty() => Value::Null,
            JsonValue::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row. Values are positional; their names live on the owning `RecordSet`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// A record is blank when every value is null or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| match v {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        })
    }
}

/// An ordered sequence of records sharing one column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl RecordSet {
    /// Builds a record set, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Result<Self, SyncError> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.values.len() != columns.len())
        {
            return Err(SyncError::Shape(format!(
                "row {i} has {} values but there are {} columns",
                row.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Record>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Mapping-style access to a single value.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.values.get(idx))
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r.values[idx]).collect())
    }

    /// Parses a grid read back from a worksheet.
    ///
    /// The first row is the header. Ragged rows are padded with nulls, cells
    /// go through `Value::from_cell`, and fully blank rows (left behind by
    /// sheet padding) are discarded. A grid with no header yields an empty set
    /// with no columns.
    pub fn from_grid(grid: Vec<Vec<CellValue>>) -> Self {
        let mut rows = grid.into_iter();
        let Some(header) = rows.next() else {
            return Self::default();
        };

        let mut columns: Vec<String> = header
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let h = Value::from_cell(h).to_string().trim().to_string();
                if h.is_empty() {
                    format!("Unnamed: {i}")
                } else {
                    h
                }
            })
            .collect();

        let body: Vec<Vec<CellValue>> = rows.collect();
        let width = body
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(columns.len());
        for i in columns.len()..width {
            columns.push(format!("Unnamed: {i}"));
        }

        let records = body
            .into_iter()
            .map(|cells| {
                let mut values: Vec<Value> = cells.into_iter().map(Value::from_cell).collect();
                values.resize(width, Value::Null);
                Record::new(values)
            })
            .filter(|r| !r.is_blank())
            .collect();

        Self {
            columns,
            rows: records,
        }
    }

    /// Renders the set as a header row followed by one row per record.
    pub fn to_grid(&self) -> Vec<Vec<CellValue>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(
            self.columns
                .iter()
                .map(|c| CellValue::String(c.clone()))
                .collect(),
        );
        grid.extend(
            self.rows
                .iter()
                .map(|r| r.values.iter().map(Value::to_cell).collect()),
        );
        grid
    }
}
