use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};

use crate::{
    data::{Value, column_key, excel_serial_to_date, format_day_first},
    dialect::{self, TableSource, Verdict, Vocabulary},
    frame::{RawTable, Row},
};

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Marker found in the first cell of exports that open with a report title block.
const TITLE_MARKER: &str = "RELATÓRIO";
const HEADER_SEARCH_ROWS: usize = 6;
const HEADER_LABELS: &[&str] = &["NOME", "CPF", "COLABORADOR"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Reads the first worksheet, skipping a leading report title block if present.
pub fn read_first_sheet(
    path: &Path,
    vocabulary: &Vocabulary,
) -> Result<(RawTable, TableSource, Verdict)> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook {path:?} has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Reading worksheet '{sheet}' from {path:?}"))?;

    let rows: Vec<Row> = range
        .rows()
        .map(|cells| cells.iter().map(cell_to_value).collect())
        .collect();
    let header_row = locate_header_row(&rows);
    let table = table_from_rows(rows, header_row);
    let verdict = dialect::evaluate(&table, vocabulary)?;
    Ok((table, TableSource::Workbook { sheet, header_row }, verdict))
}

pub fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Value::Text(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|date| Value::Text(format_day_first(date))),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::Text(s.clone())),
    }
}

/// Index of the header row: zero unless the sheet opens with a title block.
pub fn locate_header_row(rows: &[Row]) -> usize {
    let opens_with_title = rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_ref())
        .is_some_and(|value| column_key(&value.as_display()).contains(TITLE_MARKER));
    if !opens_with_title {
        return 0;
    }
    rows.iter()
        .take(HEADER_SEARCH_ROWS)
        .skip(1)
        .position(|row| {
            row.iter().flatten().any(|value| {
                let key = column_key(&value.as_display());
                HEADER_LABELS.iter().any(|label| key.contains(label))
            })
        })
        .map_or(0, |idx| idx + 1)
}

fn table_from_rows(mut rows: Vec<Row>, header_row: usize) -> RawTable {
    if rows.len() <= header_row {
        return RawTable::empty();
    }
    let data = rows.split_off(header_row + 1);
    let headers = rows
        .pop()
        .unwrap_or_default()
        .into_iter()
        .map(|cell| cell.map(|value| value.as_display()).unwrap_or_default())
        .collect::<Vec<_>>();
    let width = headers.len();
    let data = data
        .into_iter()
        .filter(|row| row.iter().any(Option::is_some))
        .map(|mut row| {
            row.truncate(width);
            row
        })
        .collect();
    RawTable::new(headers, data)
}
