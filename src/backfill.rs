//! Post-merge gap filling between rows that describe the same person.
//!
//! Rows are grouped twice: by national ID and by the uppercased name + team
//! pair. Within a group every blank cell takes the first non-blank value of
//! its column. Both groupings repeat until nothing changes, so a second run
//! over the output is a no-op.

use std::collections::HashMap;

use log::debug;

use crate::{
    consolidate::OutputLayout,
    data::{Value, display_cell, is_blank},
    frame::ConsolidatedTable,
    identity::composite_part,
};

/// Fills blank cells from sibling rows and returns how many cells were filled.
pub fn backfill(table: &mut ConsolidatedTable, layout: &OutputLayout) -> usize {
    let id_column = table.column_index(&layout.id_column);
    let name_column = table.column_index(&layout.name_column);
    let team_column = table.column_index(&layout.team_column);
    let fillable: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !layout.is_identity(header) && !layout.is_provenance(header))
        .map(|(idx, _)| idx)
        .collect();
    if fillable.is_empty() || table.row_count() < 2 {
        return 0;
    }

    let mut groupings = Vec::new();
    if let Some(id) = id_column {
        groupings.push(group_rows(table, |row| {
            let value = display_cell(row[id].as_ref());
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }));
    }
    if let (Some(name), Some(team)) = (name_column, team_column) {
        groupings.push(group_rows(table, |row| {
            let name = composite_part(row[name].as_ref())?;
            let team = composite_part(row[team].as_ref())?;
            Some(format!("{name}|{team}"))
        }));
    }

    let mut filled = 0;
    loop {
        let mut changed = 0;
        for groups in &groupings {
            for members in groups {
                changed += fill_group(table, members, &fillable);
            }
        }
        if changed == 0 {
            break;
        }
        filled += changed;
    }
    if filled > 0 {
        debug!("Backfill filled {filled} blank cell(s)");
    }
    filled
}

/// Row indices per key, for keys shared by at least two rows.
fn group_rows<F>(table: &ConsolidatedTable, key_of: F) -> Vec<Vec<usize>>
where
    F: Fn(&[Option<Value>]) -> Option<String>,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        if let Some(key) = key_of(row) {
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(idx);
        }
    }
    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter(|members| members.len() > 1)
        .collect()
}

fn fill_group(table: &mut ConsolidatedTable, members: &[usize], columns: &[usize]) -> usize {
    let mut changed = 0;
    for &column in columns {
        let donor = members
            .iter()
            .find_map(|&row| table.rows[row][column].as_ref().filter(|v| !v.is_blank()))
            .cloned();
        let Some(donor) = donor else {
            continue;
        };
        for &row in members {
            let cell = &mut table.rows[row][column];
            if is_blank(cell.as_ref()) {
                *cell = Some(donor.clone());
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::text_cell;

    fn table(rows: &[&[&str]]) -> ConsolidatedTable {
        ConsolidatedTable {
            headers: ["CPF", "Nome", "Equipe", "_source_files", "Arquivo_F", "Turno", "Cargo"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| text_cell(v)).collect())
                .collect(),
        }
    }

    #[test]
    fn composite_group_fills_blanks_from_first_non_blank() {
        let mut t = table(&[
            &["12345678901", "Ana", "TI", "F", "", "", "Analista"],
            &["", "ana", " ti ", "G", "x.csv", "Manhã", ""],
            &["", "Bia", "TI", "G", "", "Noite", ""],
        ]);
        let filled = backfill(&mut t, &OutputLayout::default());
        assert_eq!(filled, 2);
        assert_eq!(t.value(0, "Turno"), Some(&Value::text("Manhã")));
        assert_eq!(t.value(1, "Cargo"), Some(&Value::text("Analista")));
        assert_eq!(t.value(0, "Arquivo_F"), None);
        assert_eq!(t.value(1, "CPF"), None);
        assert_eq!(t.value(2, "Cargo"), None);
    }

    #[test]
    fn existing_values_are_never_overwritten() {
        let mut t = table(&[
            &["12345678901", "Ana", "TI", "F", "", "Manhã", ""],
            &["12345678901", "Ana", "RH", "G", "", "Noite", "Gerente"],
        ]);
        backfill(&mut t, &OutputLayout::default());
        assert_eq!(t.value(0, "Turno"), Some(&Value::text("Manhã")));
        assert_eq!(t.value(1, "Turno"), Some(&Value::text("Noite")));
        assert_eq!(t.value(0, "Cargo"), Some(&Value::text("Gerente")));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut t = table(&[
            &["12345678901", "Ana", "TI", "F", "", "", "Analista"],
            &["12345678901", "Ana", "RH", "G", "", "Manhã", ""],
            &["", "ANA", "RH", "H", "", "", ""],
        ]);
        let layout = OutputLayout::default();
        assert!(backfill(&mut t, &layout) > 0);
        let once = t.clone();
        assert_eq!(backfill(&mut t, &layout), 0);
        assert_eq!(t, once);
        assert_eq!(t.value(2, "Cargo"), Some(&Value::text("Analista")));
    }
}
