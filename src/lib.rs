pub mod backfill;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod data;
pub mod dialect;
pub mod engine;
pub mod export;
pub mod frame;
pub mod identity;
pub mod io_utils;
pub mod origin;
pub mod table;
pub mod validate;
pub mod workbook;

use std::{env, fs::File, io::BufWriter, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::{
    catalog::{DirectoryCatalog, FileCatalog},
    cli::{Cli, Commands},
    config::Settings,
    dialect::{EncodingCandidate, SniffOutcome},
    engine::{ConsolidationSummary, Consolidator},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("report_consolidator", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Consolidate(args) => handle_consolidate(&args),
        Commands::Sniff(args) => handle_sniff(&args),
        Commands::Files(args) => handle_files(&args),
    }
}

fn handle_consolidate(args: &cli::ConsolidateArgs) -> Result<()> {
    let mut settings = Settings::load_or_default(args.config.as_deref())?;
    if let Some(dir) = &args.output_dir {
        settings.destination = Some(dir.clone());
    }
    if let Some(name) = &args.output_name {
        settings.output_file_name = name.clone();
    }
    settings.validate()?;
    info!("Consolidating exports under {:?}", args.root);

    let catalog = DirectoryCatalog::new(&args.root, &settings.extensions)
        .excluding(settings.output_file_name.clone());
    let files = catalog
        .list_files()
        .with_context(|| format!("Listing exports under {:?}", args.root))?;
    debug!("Catalog returned {} file(s)", files.len());

    let destination = settings.destination_or(catalog.root());
    let consolidator = Consolidator::new(settings);
    let mut progress = |message: &str| info!("{message}");
    let mut report = consolidator.consolidate(&files, Some(&mut progress));

    if report.is_empty() {
        println!(
            "Consolidation finished successfully with 0 records ({} file(s) scanned)",
            report.summary.files
        );
    } else {
        let path = export::export_table(
            &report.table,
            &destination,
            &consolidator.settings().output_file_name,
        )?;
        println!(
            "Consolidated {} record(s) x {} column(s) into {}",
            report.summary.records,
            report.summary.columns,
            path.display()
        );
        report.summary.output = Some(path);
        if args.preview > 0 {
            table::print_preview(&report.table.headers, &report.table.rows, args.preview);
        }
    }

    if let Some(path) = &args.summary_json {
        write_summary(&report.summary, path)?;
    }
    Ok(())
}

fn write_summary(summary: &ConsolidationSummary, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Writing summary JSON to {path:?}"))?;
    info!("Run summary written to {path:?}");
    Ok(())
}

fn handle_sniff(args: &cli::SniffArgs) -> Result<()> {
    let settings = Settings::load_or_default(args.config.as_deref())?;
    let file_name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let origin = args.origin.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .and_then(|parent| parent.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let mut options = settings.sniff_options_for(&origin, &file_name);
    if let Some(delimiter) = args.delimiter {
        options.delimiters = vec![delimiter];
    }
    if let Some(label) = &args.input_encoding {
        let encoding = io_utils::resolve_encoding(Some(label))?;
        options.encodings = vec![EncodingCandidate::Label(encoding)];
    }
    if let Some(offset) = args.skip_rows {
        options.header_offsets = Some(vec![offset]);
    }
    info!(
        "Sniffing '{}' over {} hypothesis(es)",
        args.input.display(),
        options.hypotheses().len()
    );

    match dialect::sniff_file(&args.input, &options) {
        SniffOutcome::Parsed {
            table,
            source,
            verdict,
        } => {
            println!("Dialect: {source}");
            println!("Verdict: {verdict:?}");
            println!(
                "Rows: {}, columns: {}",
                table.row_count(),
                table.column_count()
            );
            if args.rows > 0 {
                table::print_preview(table.headers(), table.rows(), args.rows);
            }
            Ok(())
        }
        SniffOutcome::TooSmall { bytes } => {
            println!(
                "File has {bytes} byte(s), below the {} byte threshold; treated as empty",
                options.min_file_bytes
            );
            Ok(())
        }
        SniffOutcome::Unreadable { reason } => {
            bail!("No viable dialect for {:?}: {reason}", args.input)
        }
    }
}

fn handle_files(args: &cli::FilesArgs) -> Result<()> {
    let settings = Settings::load_or_default(args.config.as_deref())?;
    let catalog = DirectoryCatalog::new(&args.root, &settings.extensions)
        .excluding(settings.output_file_name.clone());
    let files = catalog.list_files()?;
    if files.is_empty() {
        println!("No exports found under {}", args.root.display());
        return Ok(());
    }
    for (origin, group) in &files.iter().chunk_by(|file| file.origin.clone()) {
        let names = group.map(|file| file.file_name()).collect::<Vec<_>>();
        let label = if origin.is_empty() {
            settings.root_label.as_str()
        } else {
            origin.as_str()
        };
        println!("{label} ({} file(s))", names.len());
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
