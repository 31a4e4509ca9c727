//! Pipeline driver: catalog files → per-origin tables → consolidated table.

use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::{
    backfill,
    catalog::SourceFile,
    config::Settings,
    consolidate::{ConsolidationContext, OutputLayout},
    frame::ConsolidatedTable,
    origin::{self, OriginStats},
};

/// Per-origin counts reported after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OriginSummary {
    pub origin: String,
    #[serde(flatten)]
    pub stats: OriginStats,
    pub rows_merged: usize,
    pub rows_without_identity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationSummary {
    pub files: usize,
    pub records: usize,
    pub columns: usize,
    pub cells_backfilled: usize,
    pub origins: Vec<OriginSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl ConsolidationSummary {
    pub fn unreadable_files(&self) -> usize {
        self.origins
            .iter()
            .map(|origin| origin.stats.unreadable_files.len())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub table: ConsolidatedTable,
    pub summary: ConsolidationSummary,
}

impl ConsolidationReport {
    /// True when no identity survived; the run still counts as a success.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub type Progress<'a> = Option<&'a mut dyn FnMut(&str)>;

pub struct Consolidator {
    settings: Settings,
}

impl Consolidator {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> OutputLayout {
        self.settings.output_layout()
    }

    /// Runs the whole pipeline over `files`.
    ///
    /// Origins are processed in order of first appearance in `files`. Every
    /// call builds a fresh consolidation context.
    pub fn consolidate(&self, files: &[SourceFile], mut progress: Progress<'_>) -> ConsolidationReport {
        let mut report = |message: String| {
            if let Some(callback) = progress.as_mut() {
                callback(&message);
            }
        };

        let groups = group_by_origin(files);
        let total = groups.len();
        let layout = self.layout();

        let mut origin_tables = Vec::with_capacity(total);
        for (idx, (name, members)) in groups.iter().enumerate() {
            report(format!(
                "Merging origin {}/{total}: {}",
                idx + 1,
                layout.origin_label(name)
            ));
            origin_tables.push(origin::merge_origin(name, members, &self.settings));
        }

        let mut summary = ConsolidationSummary {
            files: files.len(),
            ..ConsolidationSummary::default()
        };
        let mut context = ConsolidationContext::new(layout.clone(), self.settings.identity.clone());
        let non_empty = origin_tables.iter().filter(|o| !o.is_empty()).count();
        let mut position = 0;
        for table in origin_tables {
            let mut origin_summary = OriginSummary {
                origin: layout.origin_label(&table.name).to_string(),
                ..OriginSummary::default()
            };
            if table.is_empty() {
                warn!("Skipping empty origin '{}'", origin_summary.origin);
            } else {
                position += 1;
                report(format!(
                    "Consolidating origin {position}/{non_empty}: {}",
                    origin_summary.origin
                ));
                let absorbed = context.absorb(&table);
                origin_summary.rows_merged = absorbed.processed;
                origin_summary.rows_without_identity = absorbed.skipped;
            }
            origin_summary.stats = table.stats;
            summary.origins.push(origin_summary);
        }

        let mut table = context.into_table();
        if table.is_empty() {
            warn!("No records consolidated from {} file(s)", files.len());
            return ConsolidationReport {
                table: ConsolidatedTable::default(),
                summary,
            };
        }
        summary.cells_backfilled = backfill::backfill(&mut table, &layout);
        summary.records = table.row_count();
        summary.columns = table.column_count();
        info!(
            "Consolidated {} record(s) across {} column(s)",
            summary.records, summary.columns
        );
        ConsolidationReport { table, summary }
    }
}

/// Groups files by origin, keeping the first-appearance order of origins.
fn group_by_origin(files: &[SourceFile]) -> Vec<(String, Vec<SourceFile>)> {
    let mut groups: Vec<(String, Vec<SourceFile>)> = Vec::new();
    for file in files {
        match groups.iter_mut().find(|(origin, _)| *origin == file.origin) {
            Some((_, members)) => members.push(file.clone()),
            None => groups.push((file.origin.clone(), vec![file.clone()])),
        }
    }
    groups
}
