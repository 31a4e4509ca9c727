//! Dialect discovery for delimited exports of unknown shape.
//!
//! The sniffer enumerates an ordered list of [`Dialect`] hypotheses
//! (encoding × separator × header offset) and runs every one through a single
//! validation predicate. The first hypothesis whose columns are *recognized*
//! by the header vocabulary wins; failing that, the first merely *syntactic*
//! candidate is accepted as a last resort. Nothing here raises: unreadable
//! input comes back as a [`SniffOutcome`] the caller logs and skips.

use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::Path,
};

use encoding_rs::Encoding;
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    data::{column_key, text_cell},
    frame::{RawTable, Row, is_placeholder_header},
    io_utils, printable_delimiter, workbook,
};

pub const DEFAULT_MIN_FILE_BYTES: u64 = 200;
pub const MAX_HEADER_OFFSET: usize = 5;
pub const DEFAULT_SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Header offset declared for report types whose exports carry a title block.
const HEADER_HINTS: &[(&str, usize)] = &[
    ("ABSENTEISMO", 4),
    ("ABSENTEÍSMO", 4),
    ("ASSINATURA", 4),
];

/// Generic label some exports put above a duplicated header row.
const PERSON_LABEL: &str = "COLABORADOR";

/// Portuguese stems, matched anywhere inside a header.
const STANDARD_TERMS: &[&str] = &[
    "NOME",
    "CPF",
    "EQUIPE",
    "DEPARTAMENTO",
    "DATA",
    "CARGO",
    "COLABORADOR",
    "TURNO",
    "ADMISSAO",
    "ADMISSÃO",
    "DEMISSAO",
    "DEMISSÃO",
    "FALTA",
    "AUSENCIA",
    "AUSÊNCIA",
    "SOLICITA",
    "ASSINA",
    "JORNADA",
    "PONTO",
    "HORA",
];

/// Short terms that only count as whole words (`ROLE` must not match `CONTROLE`).
const STANDARD_WORDS: &[&str] = &[
    "NAME", "TEAM", "DATE", "ROLE", "EMPLOYEE", "SHIFT", "PIS", "ABSENCE", "REQUEST", "SIGNED",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingCandidate {
    /// UTF-8 that must start with a byte-order mark.
    Utf8Sig,
    Utf8,
    /// ISO-8859-1; rejected when the text would contain C1 control characters.
    Latin1,
    Windows1252,
    /// An explicit encoding label supplied by the operator.
    Label(&'static Encoding),
}

impl EncodingCandidate {
    pub const STANDARD: [EncodingCandidate; 4] = [
        EncodingCandidate::Utf8Sig,
        EncodingCandidate::Utf8,
        EncodingCandidate::Latin1,
        EncodingCandidate::Windows1252,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EncodingCandidate::Utf8Sig => "utf-8-sig",
            EncodingCandidate::Utf8 => "utf-8",
            EncodingCandidate::Latin1 => "iso-8859-1",
            EncodingCandidate::Windows1252 => "windows-1252",
            EncodingCandidate::Label(encoding) => encoding.name(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, Rejection> {
        match self {
            EncodingCandidate::Utf8Sig => {
                let body = io_utils::strip_utf8_bom(bytes).ok_or(Rejection::MissingSignature)?;
                io_utils::decode_utf8_strict(body).ok_or(Rejection::Undecodable(self.name()))
            }
            EncodingCandidate::Utf8 => {
                io_utils::decode_utf8_strict(bytes).ok_or(Rejection::Undecodable(self.name()))
            }
            EncodingCandidate::Latin1 => {
                let text = io_utils::decode_latin1(bytes);
                if text.chars().any(|ch| ('\u{80}'..='\u{9f}').contains(&ch)) {
                    Err(Rejection::ControlCharacters)
                } else {
                    Ok(text)
                }
            }
            EncodingCandidate::Windows1252 => io_utils::decode_windows_1252(bytes)
                .ok_or(Rejection::Undecodable(self.name())),
            EncodingCandidate::Label(encoding) => {
                let body = io_utils::strip_utf8_bom(bytes).unwrap_or(bytes);
                io_utils::decode_bytes(body, encoding)
                    .map_err(|_| Rejection::Undecodable(encoding.name()))
            }
        }
    }
}

/// One (encoding, separator, header offset) hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub encoding: EncodingCandidate,
    pub delimiter: u8,
    pub header_offset: usize,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "encoding={}, delimiter='{}', header offset={}",
            self.encoding.name(),
            printable_delimiter(self.delimiter),
            self.header_offset
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("bytes are not valid {0}")]
    Undecodable(&'static str),
    #[error("missing UTF-8 byte-order mark")]
    MissingSignature,
    #[error("decoded text contains C1 control characters")]
    ControlCharacters,
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("file has fewer than {0} line(s)")]
    OffsetBeyondEnd(usize),
    #[error("no data rows below the header")]
    NoDataRows,
    #[error("table collapses to a single column")]
    SingleColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// At least one column name belongs to the header vocabulary.
    Recognized,
    /// Structurally sound but nothing in the header looks familiar.
    Syntactic,
}

/// Expected header terms used to tell a real header row from noise.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: Vec<String>,
    words: Vec<String>,
    columns: HashSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl Vocabulary {
    pub fn standard() -> Self {
        Self {
            terms: STANDARD_TERMS.iter().map(|term| term.to_string()).collect(),
            words: STANDARD_WORDS.iter().map(|word| word.to_string()).collect(),
            columns: HashSet::new(),
        }
    }

    /// Adds exact column names, typically the configured columns of one report type.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns
            .extend(columns.into_iter().map(|c| column_key(c.as_ref())));
        self
    }

    /// Blank cells and the names generated for them are never recognized.
    pub fn recognizes(&self, column: &str) -> bool {
        let key = column_key(column);
        if key.is_empty() || is_placeholder_header(column) {
            return false;
        }
        self.columns.contains(&key)
            || self.terms.iter().any(|term| key.contains(term.as_str()))
            || key
                .split(|ch: char| !ch.is_alphanumeric())
                .any(|token| self.words.iter().any(|word| word == token))
    }

    pub fn matches_any<S: AsRef<str>>(&self, headers: &[S]) -> bool {
        headers.iter().any(|header| self.recognizes(header.as_ref()))
    }
}

#[derive(Debug, Clone)]
pub struct SniffOptions {
    pub min_file_bytes: u64,
    pub header_hint: Option<usize>,
    pub vocabulary: Vocabulary,
    pub encodings: Vec<EncodingCandidate>,
    pub delimiters: Vec<u8>,
    /// Explicit header offsets; `None` means the hint followed by `0..=5`.
    pub header_offsets: Option<Vec<usize>>,
}

impl Default for SniffOptions {
    fn default() -> Self {
        Self {
            min_file_bytes: DEFAULT_MIN_FILE_BYTES,
            header_hint: None,
            vocabulary: Vocabulary::standard(),
            encodings: EncodingCandidate::STANDARD.to_vec(),
            delimiters: DEFAULT_SEPARATORS.to_vec(),
            header_offsets: None,
        }
    }
}

impl SniffOptions {
    pub fn offsets(&self) -> Vec<usize> {
        if let Some(explicit) = &self.header_offsets {
            return explicit.clone();
        }
        let mut offsets = Vec::with_capacity(MAX_HEADER_OFFSET + 2);
        offsets.extend(self.header_hint);
        for offset in 0..=MAX_HEADER_OFFSET {
            if !offsets.contains(&offset) {
                offsets.push(offset);
            }
        }
        offsets
    }

    /// The ordered hypothesis list: encoding-major, then separator, then offset.
    pub fn hypotheses(&self) -> Vec<Dialect> {
        let offsets = self.offsets();
        let mut hypotheses =
            Vec::with_capacity(self.encodings.len() * self.delimiters.len() * offsets.len());
        for &encoding in &self.encodings {
            for &delimiter in &self.delimiters {
                for &header_offset in &offsets {
                    hypotheses.push(Dialect {
                        encoding,
                        delimiter,
                        header_offset,
                    });
                }
            }
        }
        hypotheses
    }
}

/// Where a parsed table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Delimited(Dialect),
    Workbook { sheet: String, header_row: usize },
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::Delimited(dialect) => write!(f, "{dialect}"),
            TableSource::Workbook { sheet, header_row } => {
                write!(f, "sheet='{sheet}', header row={header_row}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum SniffOutcome {
    Parsed {
        table: RawTable,
        source: TableSource,
        verdict: Verdict,
    },
    TooSmall {
        bytes: u64,
    },
    Unreadable {
        reason: String,
    },
}

impl SniffOutcome {
    /// The parsed table, or an empty one when nothing viable was found.
    pub fn into_table(self) -> RawTable {
        match self {
            SniffOutcome::Parsed { table, .. } => table,
            _ => RawTable::empty(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, SniffOutcome::Parsed { .. })
    }
}

/// Header offset declared for a report type, derived from its file name.
pub fn header_hint_for(file_name: &str) -> Option<usize> {
    let upper = file_name.to_uppercase();
    HEADER_HINTS
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, offset)| *offset)
}

pub fn sniff_file(path: &Path, options: &SniffOptions) -> SniffOutcome {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) => {
            warn!("Cannot stat {name}: {err}");
            return SniffOutcome::Unreadable {
                reason: err.to_string(),
            };
        }
    };
    if size < options.min_file_bytes {
        warn!("File too small ({size} bytes), treating as empty: {name}");
        return SniffOutcome::TooSmall { bytes: size };
    }

    if workbook::is_workbook(path) {
        return match workbook::read_first_sheet(path, &options.vocabulary) {
            Ok((table, source, verdict)) => {
                info!("Workbook read: {name} ({} rows, {source})", table.row_count());
                SniffOutcome::Parsed {
                    table,
                    source,
                    verdict,
                }
            }
            Err(err) => {
                warn!("Cannot read workbook {name}: {err:#}");
                SniffOutcome::Unreadable {
                    reason: format!("{err:#}"),
                }
            }
        };
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Cannot read {name}: {err}");
            return SniffOutcome::Unreadable {
                reason: err.to_string(),
            };
        }
    };
    let outcome = sniff_bytes(&bytes, options);
    match &outcome {
        SniffOutcome::Parsed {
            table,
            source,
            verdict: Verdict::Recognized,
        } => info!(
            "CSV read: {name} ({} rows, {} columns, {source})",
            table.row_count(),
            table.column_count()
        ),
        SniffOutcome::Parsed { source, .. } => {
            warn!("No expected columns in {name}, accepting anyway ({source})")
        }
        SniffOutcome::Unreadable { reason } => warn!("Could not read {name}: {reason}"),
        SniffOutcome::TooSmall { .. } => {}
    }
    outcome
}

/// Runs the hypothesis search over in-memory bytes of a delimited file.
pub fn sniff_bytes(bytes: &[u8], options: &SniffOptions) -> SniffOutcome {
    let mut decoded: HashMap<EncodingCandidate, Result<String, Rejection>> = HashMap::new();
    let mut fallback: Option<(RawTable, Dialect)> = None;
    let mut last_rejection: Option<Rejection> = None;

    for dialect in options.hypotheses() {
        let text = decoded
            .entry(dialect.encoding)
            .or_insert_with(|| dialect.encoding.decode(bytes));
        let text = match text {
            Ok(text) => text.as_str(),
            Err(rejection) => {
                last_rejection = Some(rejection.clone());
                continue;
            }
        };
        match try_hypothesis(text, &dialect, &options.vocabulary) {
            Ok((table, Verdict::Recognized)) => {
                return SniffOutcome::Parsed {
                    table,
                    source: TableSource::Delimited(dialect),
                    verdict: Verdict::Recognized,
                };
            }
            Ok((table, Verdict::Syntactic)) => {
                if fallback.is_none() {
                    fallback = Some((table, dialect));
                }
            }
            Err(rejection) => {
                debug!("Rejected {dialect}: {rejection}");
                last_rejection = Some(rejection);
            }
        }
    }

    match fallback {
        Some((table, dialect)) => SniffOutcome::Parsed {
            table,
            source: TableSource::Delimited(dialect),
            verdict: Verdict::Syntactic,
        },
        None => SniffOutcome::Unreadable {
            reason: last_rejection
                .map(|r| r.to_string())
                .unwrap_or_else(|| "no dialect hypotheses".to_string()),
        },
    }
}

/// Parses `text` under one hypothesis and scores the result.
pub fn try_hypothesis(
    text: &str,
    dialect: &Dialect,
    vocabulary: &Vocabulary,
) -> Result<(RawTable, Verdict), Rejection> {
    let body = io_utils::skip_lines(text, dialect.header_offset)
        .ok_or(Rejection::OffsetBeyondEnd(dialect.header_offset))?;
    let records = io_utils::read_delimited(body, dialect.delimiter)
        .map_err(|err| Rejection::Parse(format!("{err:#}")))?;

    let mut header_index = 0;
    let (mut header, mut rows, _) = records
        .split_at_header(header_index)
        .ok_or(Rejection::NoDataRows)?;

    if header.len() == 2
        && column_key(&header[0]).contains(PERSON_LABEL)
        && records
            .records
            .get(header_index + 1)
            .is_some_and(|first| row_looks_like_header(first, vocabulary))
    {
        header_index = 1;
        if let Some((promoted, promoted_rows, _)) = records.split_at_header(header_index) {
            debug!("Promoting duplicated header row under {dialect}");
            header = promoted;
            rows = promoted_rows;
        }
    }

    let table = RawTable::new(
        header,
        rows.into_iter()
            .map(|row| row.iter().map(|field| text_cell(field)).collect::<Row>())
            .collect(),
    );
    evaluate(&table, vocabulary).map(|verdict| (table, verdict))
}

/// The single validation predicate every hypothesis is scored by.
pub fn evaluate(table: &RawTable, vocabulary: &Vocabulary) -> Result<Verdict, Rejection> {
    if table.row_count() < 1 {
        return Err(Rejection::NoDataRows);
    }
    // a title line padded with separators has one real cell and blank fillers
    if table.named_headers().count() <= 1 {
        return Err(Rejection::SingleColumn);
    }
    if vocabulary.matches_any(table.headers()) {
        Ok(Verdict::Recognized)
    } else {
        Ok(Verdict::Syntactic)
    }
}

fn row_looks_like_header(row: &[String], vocabulary: &Vocabulary) -> bool {
    let filled = row.iter().filter(|value| !value.trim().is_empty()).count();
    filled >= 2 && row.iter().any(|value| vocabulary.recognizes(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latin1(text: &str) -> Vec<u8> {
        text.chars().map(|ch| ch as u32 as u8).collect()
    }

    #[test]
    fn hypotheses_put_hint_first_without_duplicates() {
        let options = SniffOptions {
            header_hint: Some(4),
            ..SniffOptions::default()
        };
        assert_eq!(options.offsets(), vec![4, 0, 1, 2, 3, 5]);
        let hypotheses = options.hypotheses();
        assert_eq!(hypotheses.len(), 4 * 3 * 6);
        assert_eq!(hypotheses[0].encoding, EncodingCandidate::Utf8Sig);
        assert_eq!(hypotheses[0].header_offset, 4);
    }

    #[test]
    fn header_hint_follows_report_type() {
        assert_eq!(header_hint_for("Pontomais_-_Absenteísmo_(01.10.2025).csv"), Some(4));
        assert_eq!(header_hint_for("pontomais_-_assinaturas.csv"), Some(4));
        assert_eq!(header_hint_for("Pontomais_-_Faltas.csv"), None);
    }

    #[test]
    fn single_column_hypothesis_is_rejected() {
        let dialect = Dialect {
            encoding: EncodingCandidate::Utf8,
            delimiter: b',',
            header_offset: 0,
        };
        let err = try_hypothesis("Nome;Equipe\nAna;TI\n", &dialect, &Vocabulary::standard())
            .unwrap_err();
        assert_eq!(err, Rejection::SingleColumn);
    }

    #[test]
    fn english_terms_match_whole_words_only() {
        let vocabulary = Vocabulary::standard();
        assert!(vocabulary.recognizes("Employee name"));
        assert!(vocabulary.recognizes("Start date"));
        assert!(!vocabulary.recognizes("Controle"));
        assert!(!vocabulary.recognizes("Last update"));
        assert!(!vocabulary.recognizes("Unnamed: 1"));
        assert!(vocabulary.recognizes("Data da assinatura"));
    }

    #[test]
    fn padded_title_line_is_a_single_column() {
        let dialect = Dialect {
            encoding: EncodingCandidate::Utf8,
            delimiter: b';',
            header_offset: 0,
        };
        let text = "Relatório de faltas;;\nAna;TI;Atestado\n";
        let err = try_hypothesis(text, &dialect, &Vocabulary::standard()).unwrap_err();
        assert_eq!(err, Rejection::SingleColumn);
    }

    #[test]
    fn header_only_hypothesis_is_rejected() {
        let dialect = Dialect {
            encoding: EncodingCandidate::Utf8,
            delimiter: b';',
            header_offset: 0,
        };
        let err = try_hypothesis("Nome;Equipe\n", &dialect, &Vocabulary::standard()).unwrap_err();
        assert_eq!(err, Rejection::NoDataRows);
    }

    #[test]
    fn recognized_candidate_beats_earlier_syntactic_one() {
        let text = "Periodo,01/10/2025 a 31/10/2025\nx,y\nNome,Equipe\nAna,TI\n";
        let outcome = sniff_bytes(text.as_bytes(), &SniffOptions::default());
        match outcome {
            SniffOutcome::Parsed {
                table,
                source: TableSource::Delimited(dialect),
                verdict,
            } => {
                assert_eq!(verdict, Verdict::Recognized);
                assert_eq!(dialect.header_offset, 2);
                assert_eq!(table.headers(), ["Nome", "Equipe"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn unfamiliar_headers_fall_back_to_first_syntactic_candidate() {
        let text = "alpha,beta\n1,2\n3,4\n";
        let outcome = sniff_bytes(text.as_bytes(), &SniffOptions::default());
        match outcome {
            SniffOutcome::Parsed { table, verdict, .. } => {
                assert_eq!(verdict, Verdict::Syntactic);
                assert_eq!(table.headers(), ["alpha", "beta"]);
                assert_eq!(table.row_count(), 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn duplicated_person_header_is_promoted() {
        let text = "Colaborador,Maria Silva\nData,Equipe\nSeg 01/10/2025,Vendas\n";
        let table = sniff_bytes(text.as_bytes(), &SniffOptions::default()).into_table();
        assert_eq!(table.headers(), ["Data", "Equipe"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn promoted_header_keeps_wider_rows() {
        let text = "Colaborador,Maria Silva\nData,Pontos,Equipe\n\"Seg, 01/10/2025\",08:00,Vendas\n";
        let dialect = Dialect {
            encoding: EncodingCandidate::Utf8,
            delimiter: b',',
            header_offset: 0,
        };
        let (table, verdict) = try_hypothesis(text, &dialect, &Vocabulary::standard()).unwrap();
        assert_eq!(verdict, Verdict::Recognized);
        assert_eq!(table.headers(), ["Data", "Pontos", "Equipe"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn latin1_text_is_not_mistaken_for_utf8() {
        let bytes = latin1("Nome;Ocorrência\nJoão;Atraso\n");
        let outcome = sniff_bytes(&bytes, &SniffOptions::default());
        match outcome {
            SniffOutcome::Parsed {
                table,
                source: TableSource::Delimited(dialect),
                ..
            } => {
                assert_eq!(dialect.encoding, EncodingCandidate::Latin1);
                assert_eq!(dialect.delimiter, b';');
                assert_eq!(table.headers(), ["Nome", "Ocorrência"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn windows_1252_punctuation_skips_latin1() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("Nome,Observação\nAna,“ok”\n");
        let outcome = sniff_bytes(&bytes, &SniffOptions::default());
        match outcome {
            SniffOutcome::Parsed {
                table,
                source: TableSource::Delimited(dialect),
                ..
            } => {
                assert_eq!(dialect.encoding, EncodingCandidate::Windows1252);
                assert_eq!(
                    table.cell(0, 1),
                    Some(&crate::data::Value::text("“ok”"))
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn nothing_viable_reports_unreadable() {
        let outcome = sniff_bytes(b"just one column\nand another line\n", &SniffOptions::default());
        assert!(matches!(outcome, SniffOutcome::Unreadable { .. }));
    }
}
