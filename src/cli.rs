use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Consolidate heterogeneous report exports into one table per person",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder of exports, consolidate them by identity and write the result
    Consolidate(ConsolidateArgs),
    /// Discover the dialect of a single export and preview the parsed table
    Sniff(SniffArgs),
    /// List the files a consolidation run would read, grouped by origin
    Files(FilesArgs),
}

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    /// Root folder; each subfolder is one origin (report type)
    #[arg(short = 'r', long = "root")]
    pub root: PathBuf,
    /// YAML settings file (defaults apply when omitted)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Destination folder (overrides the settings file; defaults to the root)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Output file name (overrides the settings file)
    #[arg(long = "output-name")]
    pub output_name: Option<String>,
    /// Write the run summary as JSON to this path
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
    /// Print the first N consolidated rows as a table
    #[arg(long, default_value_t = 0)]
    pub preview: usize,
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    /// Input export (CSV or spreadsheet)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML settings file supplying the size threshold and expected columns
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Origin whose expected columns seed the header vocabulary
    #[arg(long)]
    pub origin: Option<String>,
    /// Only try this delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Only try this character encoding
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Only try this header offset (lines skipped before the header)
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<usize>,
    /// Number of rows to preview
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Root folder to scan
    #[arg(short = 'r', long = "root")]
    pub root: PathBuf,
    /// YAML settings file supplying extensions and the output file name
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
