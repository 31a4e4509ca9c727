//! I/O utilities for delimited text parsing, decoding, and CSV output.
//!
//! All CSV reading and writing in the consolidator flows through this module:
//!
//! - **Decoding**: strict byte → text decoding for each candidate encoding;
//!   a decoder that would need replacement characters reports failure instead.
//! - **Parsing**: flexible `csv` readers over already-decoded text, with a
//!   line-based header offset and tolerant handling of ragged rows.
//! - **Writing**: UTF-8 output prefixed with a byte-order mark so spreadsheet
//!   tools pick the right encoding.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let mut file =
        BufWriter::new(File::create(path).with_context(|| format!("Creating output file {path:?}"))?);
    file.write_all(UTF8_BOM)
        .with_context(|| format!("Writing byte-order mark to {path:?}"))?;
    Ok(csv_writer(Box::new(file), delimiter))
}

pub fn csv_writer<W: Write>(writer: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn strip_utf8_bom(bytes: &[u8]) -> Option<&[u8]> {
    bytes.strip_prefix(UTF8_BOM)
}

/// Decodes UTF-8 without replacement, returning `None` on malformed input.
pub fn decode_utf8_strict(bytes: &[u8]) -> Option<String> {
    let bytes = strip_utf8_bom(bytes).unwrap_or(bytes);
    UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// ISO-8859-1 maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| byte as char).collect()
}

pub fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    WINDOWS_1252
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Drops the first `count` physical lines of `text`.
pub fn skip_lines(text: &str, count: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..count {
        let newline = rest.find('\n')?;
        rest = &rest[newline + 1..];
    }
    Some(rest)
}

/// Parsed records of a delimited text, before header promotion.
#[derive(Debug, Clone, Default)]
pub struct DelimitedRecords {
    pub records: Vec<Vec<String>>,
}

impl DelimitedRecords {
    /// Splits records into a header and data rows starting at `header_index`.
    ///
    /// Rows wider than the header whose surplus fields hold data are treated
    /// as malformed and skipped; narrower rows are kept and padded later.
    pub fn split_at_header(&self, header_index: usize) -> Option<(Vec<String>, Vec<Vec<String>>, usize)> {
        let header = self.records.get(header_index)?.clone();
        let width = header.len();
        let mut rows = Vec::new();
        let mut malformed = 0usize;
        for record in self.records.iter().skip(header_index + 1) {
            if record.len() > width && record[width..].iter().any(|field| !field.is_empty()) {
                malformed += 1;
                continue;
            }
            let mut row = record.clone();
            row.truncate(width);
            rows.push(row);
        }
        Some((header, rows, malformed))
    }
}

pub fn read_delimited(text: &str, delimiter: u8) -> Result<DelimitedRecords> {
    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading record {}", idx + 1))?;
        records.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(DelimitedRecords { records })
}
