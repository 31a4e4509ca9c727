//! Cross-origin consolidation into one record per identity.
//!
//! A [`ConsolidationContext`] owns the identity index for a single run. Each
//! origin table is absorbed row by row: the first sighting of an identity
//! seeds its record, later rows only add fields that are still unset.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::OnceLock,
};

use log::{debug, info};
use regex::Regex;
use serde::Serialize;

use crate::{
    config::Settings,
    data::{Value, is_blank},
    frame::{ConsolidatedTable, Row},
    identity::{IdentityAliases, IdentityColumns, IdentityKey, national_id_of},
    origin::{OriginTable, SOURCE_FILE_COLUMN},
};

const LIST_SEPARATOR: &str = "; ";

/// Output column names and labels used when shaping the consolidated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub id_column: String,
    pub name_column: String,
    pub team_column: String,
    pub date_column: String,
    pub provenance_column: String,
    pub source_files_prefix: String,
    pub root_label: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Settings::default().output_layout()
    }
}

impl OutputLayout {
    pub fn origin_label<'a>(&'a self, origin: &'a str) -> &'a str {
        if origin.is_empty() {
            &self.root_label
        } else {
            origin
        }
    }

    /// Column holding the source file names of one origin; none for the root.
    pub fn source_files_column(&self, origin: &str) -> Option<String> {
        (!origin.is_empty()).then(|| format!("{}{origin}", self.source_files_prefix))
    }

    pub fn namespaced(&self, column: &str, origin: &str) -> String {
        if origin.is_empty() {
            column.to_string()
        } else {
            format!("{column}_{origin}")
        }
    }

    pub fn is_identity(&self, column: &str) -> bool {
        column == self.id_column || column == self.name_column || column == self.team_column
    }

    pub fn is_provenance(&self, column: &str) -> bool {
        column == self.provenance_column || column.starts_with(&self.source_files_prefix)
    }
}

/// True for text cells shaped like `Seg, 01/10/2025`.
pub fn is_weekday_date(value: &Value) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(Seg|Ter|Qua|Qui|Sex|Sáb|Sab|Dom),?\s*\d{2}/\d{2}/\d{4}").ok()
    });
    match (value, pattern) {
        (Value::Text(text), Some(regex)) => regex.is_match(text),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedRecord {
    pub key: IdentityKey,
    pub id: Option<String>,
    pub name: Option<Value>,
    pub team: Option<Value>,
    pub fields: BTreeMap<String, Value>,
    /// Origin labels in first-contribution order.
    pub origins: Vec<String>,
    /// Source-files column name to the file names that fed it.
    pub source_files: BTreeMap<String, BTreeSet<String>>,
}

impl ConsolidatedRecord {
    fn new(key: IdentityKey, id: Option<String>, name: Option<Value>, team: Option<Value>) -> Self {
        Self {
            key,
            id,
            name,
            team,
            fields: BTreeMap::new(),
            origins: Vec::new(),
            source_files: BTreeMap::new(),
        }
    }

    pub fn field(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AbsorbStats {
    pub processed: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ConsolidationContext {
    layout: OutputLayout,
    aliases: IdentityAliases,
    index: HashMap<IdentityKey, usize>,
    records: Vec<ConsolidatedRecord>,
}

impl ConsolidationContext {
    pub fn new(layout: OutputLayout, aliases: IdentityAliases) -> Self {
        Self {
            layout,
            aliases,
            index: HashMap::new(),
            records: Vec::new(),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ConsolidatedRecord] {
        &self.records
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&ConsolidatedRecord> {
        self.index.get(key).map(|&idx| &self.records[idx])
    }

    pub fn absorb(&mut self, origin: &OriginTable) -> AbsorbStats {
        let table = &origin.table;
        let roles = IdentityColumns::resolve(table, &self.aliases);
        let provenance = table.column_index(SOURCE_FILE_COLUMN);
        let label = self.layout.origin_label(&origin.name).to_string();
        let files_column = self.layout.source_files_column(&origin.name);

        // (source index, target field name) for every mergeable column
        let targets: Vec<(usize, String)> = table
            .headers()
            .iter()
            .enumerate()
            .filter(|(idx, _)| !roles.contains(*idx) && Some(*idx) != provenance)
            .map(|(idx, header)| (idx, self.layout.namespaced(header, &origin.name)))
            .collect();

        let mut stats = AbsorbStats::default();
        for row in table.rows() {
            let Some(key) = roles.resolve_key(row) else {
                stats.skipped += 1;
                continue;
            };
            stats.processed += 1;
            let record_idx = self.record_for(key, &roles, row);
            let layout = &self.layout;
            let record = &mut self.records[record_idx];

            if !record.origins.contains(&label) {
                record.origins.push(label.clone());
            }
            if let Some(column) = &files_column {
                let files = record.source_files.entry(column.clone()).or_default();
                if let Some(file) = provenance.and_then(|idx| row[idx].as_ref())
                    && !file.is_blank()
                {
                    files.insert(file.as_display());
                }
            }

            for (idx, target) in &targets {
                let Some(value) = row[*idx].as_ref() else {
                    continue;
                };
                if value.is_blank() {
                    continue;
                }
                let field = if is_weekday_date(value) {
                    layout.date_column.as_str()
                } else if layout.is_identity(target) || layout.is_provenance(target) {
                    continue;
                } else {
                    target.as_str()
                };
                if !record.fields.contains_key(field) {
                    record.fields.insert(field.to_string(), value.clone());
                }
            }
        }

        info!(
            "Origin '{label}' consolidated: {} row(s) merged, {} row(s) without identity",
            stats.processed, stats.skipped
        );
        stats
    }

    fn record_for(&mut self, key: IdentityKey, roles: &IdentityColumns, row: &Row) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let cell = |idx: Option<usize>| idx.and_then(|i| row[i].clone());
        let id = national_id_of(roles.id.and_then(|i| row[i].as_ref()));
        let record = ConsolidatedRecord::new(key.clone(), id, cell(roles.name), cell(roles.team));
        debug!("New identity {key}");
        self.records.push(record);
        self.index.insert(key, self.records.len() - 1);
        self.records.len() - 1
    }

    /// Serializes the index: identity columns, date, per-origin source files,
    /// combined provenance, then every other field in lexicographic order.
    pub fn into_table(self) -> ConsolidatedTable {
        let layout = self.layout;
        let mut has_date = false;
        let mut file_columns = BTreeSet::new();
        let mut other_columns = BTreeSet::new();
        for record in &self.records {
            file_columns.extend(record.source_files.keys().cloned());
            for column in record.fields.keys() {
                if *column == layout.date_column {
                    has_date = true;
                } else {
                    other_columns.insert(column.clone());
                }
            }
        }

        let mut headers = vec![
            layout.id_column.clone(),
            layout.name_column.clone(),
            layout.team_column.clone(),
        ];
        if has_date {
            headers.push(layout.date_column.clone());
        }
        headers.extend(file_columns.iter().cloned());
        headers.push(layout.provenance_column.clone());
        headers.extend(other_columns.iter().cloned());

        let rows = self
            .records
            .into_iter()
            .map(|record| {
                let mut row: Row = Vec::with_capacity(headers.len());
                row.push(record.id.map(Value::Text));
                row.push(record.name);
                row.push(record.team);
                if has_date {
                    row.push(record.fields.get(&layout.date_column).cloned());
                }
                for column in &file_columns {
                    row.push(
                        record
                            .source_files
                            .get(column)
                            .map(|files| Value::Text(join_sorted(files.iter()))),
                    );
                }
                row.push(Some(Value::Text(join_sorted(record.origins.iter()))));
                for column in &other_columns {
                    row.push(record.fields.get(column).cloned());
                }
                row.into_iter()
                    .map(|cell| cell.filter(|value| !is_blank(Some(value))))
                    .collect()
            })
            .collect();

        ConsolidatedTable { headers, rows }
    }
}

fn join_sorted<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let sorted: BTreeSet<&String> = items.collect();
    sorted
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}
