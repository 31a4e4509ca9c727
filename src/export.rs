use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;

use crate::{data::display_cell, frame::ConsolidatedTable, io_utils};

pub const DEFAULT_OUTPUT_FILE: &str = "base_bi_consolidada.csv";

/// Writes the table as BOM-prefixed UTF-8 CSV under `destination` and returns
/// the written path. The destination folder is created when missing.
pub fn export_table(
    table: &ConsolidatedTable,
    destination: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(destination)
        .with_context(|| format!("Creating output directory {destination:?}"))?;
    let path = destination.join(file_name);
    let mut writer = io_utils::open_csv_writer(&path, b',')?;
    write_table(&mut writer, table).with_context(|| format!("Writing {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Flushing output file {path:?}"))?;
    info!(
        "Exported {} record(s) x {} column(s) to {path:?}",
        table.row_count(),
        table.column_count()
    );
    Ok(path)
}

pub fn write_table<W: Write>(writer: &mut csv::Writer<W>, table: &ConsolidatedTable) -> Result<()> {
    writer
        .write_record(&table.headers)
        .context("Writing header row")?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| display_cell(cell.as_ref())))
            .context("Writing data row")?;
    }
    Ok(())
}
