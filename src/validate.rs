//! Row validation: separates real person records from summary and garbage rows.

use crate::{
    data::Value,
    frame::RawTable,
};

/// Name-column values that mark total, summary or system rows.
pub const SUMMARY_MARKERS: &[&str] = &["TOTAL", "RESUMO", "SISTEMA", "SUMMARY", "SYSTEM"];

pub fn is_valid_name(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    let upper = trimmed.to_uppercase();
    if SUMMARY_MARKERS.iter().any(|marker| upper.contains(marker)) {
        return false;
    }
    // row counters and stray IDs leak into the name column as bare numbers
    !trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || ch == '.' || ch == ',')
}

pub fn is_person_name(cell: Option<&Value>) -> bool {
    match cell {
        None => false,
        Some(Value::Text(text)) => is_valid_name(text),
        Some(other) => is_valid_name(&other.as_display()),
    }
}

/// Drops rows whose name cell is not a person name; returns the drop count.
pub fn validate_rows(table: &mut RawTable, name_column: usize) -> usize {
    table.retain_rows(|row| is_person_name(row.get(name_column).and_then(Option::as_ref)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::text_cell;

    #[test]
    fn summary_markers_are_rejected_case_insensitively() {
        for name in ["TOTAL", "Resumo", "total geral", "Sistema", "  resumo  "] {
            assert!(!is_valid_name(name), "{name} should be rejected");
        }
    }

    #[test]
    fn numeric_and_blank_names_are_rejected() {
        for name in ["123", "1.234,5", "", "   ", "\t"] {
            assert!(!is_valid_name(name), "{name:?} should be rejected");
        }
        assert!(!is_person_name(Some(&Value::Integer(42))));
        assert!(!is_person_name(None));
    }

    #[test]
    fn ordinary_names_pass() {
        for name in ["Maria", "joão da silva", "Ana 2", "D'Ávila"] {
            assert!(is_valid_name(name), "{name} should pass");
        }
    }

    #[test]
    fn validate_rows_counts_dropped_rows() {
        let mut table = RawTable::new(
            vec!["Nome".into(), "Equipe".into()],
            vec![
                vec![text_cell("TOTAL"), text_cell("")],
                vec![text_cell("123"), text_cell("TI")],
                vec![text_cell(""), text_cell("TI")],
                vec![text_cell("Maria"), text_cell("Vendas")],
            ],
        );
        assert_eq!(validate_rows(&mut table, 0), 3);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 0), Some(&Value::text("Maria")));
    }
}
