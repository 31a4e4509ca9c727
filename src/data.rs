use std::fmt;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// A single cell as read from a source file.
///
/// Delimited files only ever produce [`Value::Text`]; spreadsheets may carry
/// numbers and booleans through unchanged. Absent cells are modelled as
/// `Option<Value>::None` by the surrounding tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// Text that is empty after trimming counts as blank; scalars never do.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn is_blank(cell: Option<&Value>) -> bool {
    cell.is_none_or(Value::is_blank)
}

/// Converts a raw delimited field into a cell, mapping the empty string to absent.
pub fn text_cell(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        None
    } else {
        Some(Value::Text(raw.to_string()))
    }
}

pub fn display_cell(cell: Option<&Value>) -> String {
    cell.map(Value::as_display).unwrap_or_default()
}

/// Trims a header, drops any byte-order mark and collapses inner whitespace runs.
pub fn normalize_column_name(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive comparison key for column names.
pub fn column_key(name: &str) -> String {
    normalize_column_name(name).to_uppercase()
}

/// Converts a spreadsheet serial day number (1900 date system) into a calendar date.
///
/// Serials outside chrono's representable range yield `None`.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(TimeDelta::try_days(serial.trunc() as i64)?)
}

pub fn format_day_first(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
