//! In-memory table model shared by the ingestion and merge phases.
//!
//! A [`RawTable`] is what one file parses into. Headers are normalized on
//! construction (trimmed, whitespace collapsed, duplicates and blanks given
//! unique names) and every row is padded or truncated to the header width, so
//! downstream code can index cells without bounds juggling.

use std::collections::HashMap;

use crate::data::{Value, column_key, normalize_column_name};

pub type Row = Vec<Option<Value>>;

/// Prefix of the names given to blank header cells.
pub const UNNAMED_PREFIX: &str = "Unnamed: ";

/// True for names produced by the blank-header fallback, e.g. `Unnamed: 2`.
pub fn is_placeholder_header(name: &str) -> bool {
    name.strip_prefix(UNNAMED_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let headers = unique_headers(headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Headers that came from real, non-blank header cells.
    pub fn named_headers(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .map(String::as_str)
            .filter(|header| !is_placeholder_header(header))
    }

    /// A table without data rows carries nothing worth merging.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive lookup of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = column_key(name);
        self.headers
            .iter()
            .position(|header| column_key(header) == wanted)
    }

    /// Returns the first column matching any of `aliases`, honouring alias order.
    pub fn find_column<S: AsRef<str>>(&self, aliases: &[S]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.column_index(alias.as_ref()))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// Keeps rows for which `keep` returns true and reports how many were dropped.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    /// Appends a column holding the same value on every row.
    pub fn push_constant_column(&mut self, name: &str, value: Option<Value>) {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

}

/// The consolidated output: one row per identity, columns in final order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ConsolidatedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Exact-name lookup; consolidated headers are already canonical.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// Cell of `row` under the column named `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.cell(row, self.column_index(name)?)
    }
}

/// Builds the row-wise union of several tables.
///
/// Columns are matched case-insensitively and keep the spelling and position
/// of their first appearance; cells missing from a given input stay absent.
pub fn concat_tables(tables: Vec<RawTable>) -> RawTable {
    let mut headers: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut mappings = Vec::with_capacity(tables.len());

    for table in &tables {
        let mapping = table
            .headers
            .iter()
            .map(|header| {
                *positions.entry(column_key(header)).or_insert_with(|| {
                    headers.push(header.clone());
                    headers.len() - 1
                })
            })
            .collect::<Vec<_>>();
        mappings.push(mapping);
    }

    let width = headers.len();
    let mut rows = Vec::with_capacity(tables.iter().map(RawTable::row_count).sum());
    for (table, mapping) in tables.into_iter().zip(mappings) {
        for row in table.rows {
            let mut merged: Row = vec![None; width];
            for (value, target) in row.into_iter().zip(mapping.iter()) {
                merged[*target] = value;
            }
            rows.push(merged);
        }
    }

    RawTable { headers, rows }
}

fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let mut name = normalize_column_name(&raw);
            if name.is_empty() {
                name = format!("{UNNAMED_PREFIX}{idx}");
            }
            let key = column_key(&name);
            match seen.get_mut(&key) {
                Some(count) => {
                    *count += 1;
                    format!("{name}.{count}")
                }
                None => {
                    seen.insert(key, 0);
                    name
                }
            }
        })
        .collect()
}
