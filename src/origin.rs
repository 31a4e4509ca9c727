//! Intra-origin merge: every file of one report type becomes a single table.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    catalog::SourceFile,
    config::Settings,
    data::Value,
    dialect::{self, SniffOutcome, Verdict},
    frame::{RawTable, concat_tables},
    validate,
};

/// Per-row provenance column added before concatenation.
pub const SOURCE_FILE_COLUMN: &str = "_source_file";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OriginStats {
    pub files: usize,
    pub files_parsed: usize,
    /// Files accepted on structure alone, with no familiar column names.
    pub files_unrecognized: usize,
    /// Files below the size threshold or without any viable dialect.
    pub unreadable_files: Vec<String>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct OriginTable {
    pub name: String,
    pub table: RawTable,
    pub stats: OriginStats,
}

impl OriginTable {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

struct FileTable {
    table: RawTable,
    verdict: Option<Verdict>,
    rows_read: usize,
    rows_dropped: usize,
}

/// Sniffs, validates and concatenates the files of one origin.
///
/// Files are read in parallel; the concatenation keeps the order of `files`.
pub fn merge_origin(name: &str, files: &[SourceFile], settings: &Settings) -> OriginTable {
    let loaded: Vec<(String, Option<FileTable>)> = files
        .par_iter()
        .map(|file| {
            let file_name = file.file_name();
            let loaded = load_file(file, &file_name, settings);
            (file_name, loaded)
        })
        .collect();

    let mut stats = OriginStats {
        files: files.len(),
        ..OriginStats::default()
    };
    let mut tables = Vec::with_capacity(loaded.len());
    for (file_name, loaded) in loaded {
        match loaded {
            Some(file_table) => {
                stats.files_parsed += 1;
                if file_table.verdict == Some(Verdict::Syntactic) {
                    stats.files_unrecognized += 1;
                }
                stats.rows_read += file_table.rows_read;
                stats.rows_dropped += file_table.rows_dropped;
                if !file_table.table.is_empty() {
                    tables.push(file_table.table);
                }
            }
            None => stats.unreadable_files.push(file_name),
        }
    }

    let table = concat_tables(tables);
    if table.is_empty() {
        warn!("Origin '{name}' produced no valid rows");
    } else {
        info!(
            "Origin '{name}': {} row(s), {} column(s) from {} file(s)",
            table.row_count(),
            table.column_count(),
            stats.files_parsed
        );
    }
    OriginTable {
        name: name.to_string(),
        table,
        stats,
    }
}

fn load_file(file: &SourceFile, file_name: &str, settings: &Settings) -> Option<FileTable> {
    let options = settings.sniff_options_for(&file.origin, file_name);
    let (mut table, verdict) = match dialect::sniff_file(&file.path, &options) {
        SniffOutcome::Parsed { table, verdict, .. } => (table, Some(verdict)),
        SniffOutcome::TooSmall { .. } | SniffOutcome::Unreadable { .. } => return None,
    };
    let rows_read = table.row_count();
    let rows_dropped = match table.find_column(&settings.identity.name) {
        Some(name_column) => {
            let dropped = validate::validate_rows(&mut table, name_column);
            if dropped > 0 {
                debug!("Dropped {dropped} invalid row(s) from {file_name}");
            }
            dropped
        }
        None => 0,
    };
    table.push_constant_column(SOURCE_FILE_COLUMN, Some(Value::text(file_name)));
    Some(FileTable {
        table,
        verdict,
        rows_read,
        rows_dropped,
    })
}
