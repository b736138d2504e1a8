//! The backend collaborator boundary.
//!
//! Queries are compiled here but described and executed elsewhere. A backend
//! implements [`Database`]; [`SqlxDatabase`](crate::engine::SqlxDatabase) is the
//! bundled one.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::WeaveResult;

/// Column types a backend is expected to understand for casts.
pub const SUPPORTED_TYPES: &[&str] = &[
    "VARCHAR",
    "TIMESTAMP",
    "HUGEINT",
    "BIGINT",
    "INTEGER",
    "SMALLINT",
    "TINYINT",
    "BOOLEAN",
    "DOUBLE",
    "FLOAT",
];

/// One column of a resolved schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Upper-cased backend type name
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_uppercase(),
        }
    }
}

/// Rows returned by [`Database::run_query`], column-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub data: Vec<Vec<serde_json::Value>>,
    pub column_types: Vec<String>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A relational backend that can describe and execute compiled SQL.
///
/// Calls are synchronous. Errors from the backend are passed through to the
/// caller without retry.
pub trait Database {
    /// Column names and types the statement would produce, without fetching rows.
    fn check_schema(&self, sql: &str) -> WeaveResult<Vec<ColumnInfo>>;

    /// Execute the statement. With `convert_datetimes`, temporal columns are
    /// rewritten to seconds since the Unix epoch (see [`convert_temporal_columns`]).
    fn run_query(&self, sql: &str, convert_datetimes: bool) -> WeaveResult<ResultSet>;

    fn supported_types(&self) -> &[&str] {
        SUPPORTED_TYPES
    }
}

fn is_date_type(t: &str) -> bool {
    t == "DATE"
}

fn is_datetime_type(t: &str) -> bool {
    t == "DATETIME" || t.starts_with("TIMESTAMP")
}

/// Rewrite DATE / DATETIME / TIMESTAMP values to fractional UTC seconds since
/// 1970-01-01T00:00:00. Values that are not parseable strings are left alone.
pub fn convert_temporal_columns(rs: &mut ResultSet) {
    let temporal: Vec<usize> = rs
        .column_types
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            let t = t.to_uppercase();
            is_date_type(&t) || is_datetime_type(&t)
        })
        .map(|(i, _)| i)
        .collect();

    if temporal.is_empty() {
        return;
    }

    for row in &mut rs.data {
        for &idx in &temporal {
            let Some(cell) = row.get_mut(idx) else {
                continue;
            };
            let converted = cell
                .as_str()
                .and_then(epoch_seconds)
                .and_then(serde_json::Number::from_f64);
            if let Some(n) = converted {
                *cell = serde_json::Value::Number(n);
            }
        }
    }
}

/// Parse a textual date or timestamp into seconds since the epoch.
/// Naive values are taken as UTC; dates as midnight.
pub fn epoch_seconds(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros() as f64 / 1_000_000.0);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_micros() as f64 / 1_000_000.0);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() as f64)
}
