//! Per-person identity keys.
//!
//! A row is keyed by its national ID when one with exactly
//! [`NATIONAL_ID_LENGTH`] digits can be extracted, and by an uppercased
//! name + team composite otherwise. Rows offering neither are unkeyable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{data::Value, frame::RawTable};

pub const NATIONAL_ID_LENGTH: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    NationalId(String),
    Composite { name: String, team: String },
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::NationalId(digits) => write!(f, "ID:{digits}"),
            IdentityKey::Composite { name, team } => write!(f, "COMPOSITE:{name}|{team}"),
        }
    }
}

/// Keeps only the digits of `raw`; anything but exactly eleven digits is no ID.
pub fn normalize_national_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == NATIONAL_ID_LENGTH).then_some(digits)
}

pub fn national_id_of(cell: Option<&Value>) -> Option<String> {
    cell.and_then(|value| normalize_national_id(&value.as_display()))
}

/// Trimmed, uppercased component of a composite key; blank yields `None`.
pub fn composite_part(cell: Option<&Value>) -> Option<String> {
    let text = cell?.as_display();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
}

pub fn composite_key(name: Option<&Value>, team: Option<&Value>) -> Option<IdentityKey> {
    Some(IdentityKey::Composite {
        name: composite_part(name)?,
        team: composite_part(team)?,
    })
}

/// Header aliases for the identity roles, matched case-insensitively in order.
///
/// The first alias of each role doubles as the output column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityAliases {
    pub id: Vec<String>,
    pub name: Vec<String>,
    pub team: Vec<String>,
}

impl Default for IdentityAliases {
    fn default() -> Self {
        Self {
            id: vec!["CPF".to_string()],
            name: vec!["Nome".to_string(), "Colaborador".to_string()],
            team: vec!["Equipe".to_string(), "Departamento".to_string()],
        }
    }
}

/// Positions of the identity roles within one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityColumns {
    pub id: Option<usize>,
    pub name: Option<usize>,
    pub team: Option<usize>,
}

impl IdentityColumns {
    pub fn resolve(table: &RawTable, aliases: &IdentityAliases) -> Self {
        Self {
            id: table.find_column(&aliases.id),
            name: table.find_column(&aliases.name),
            team: table.find_column(&aliases.team),
        }
    }

    pub fn contains(&self, column: usize) -> bool {
        [self.id, self.name, self.team].contains(&Some(column))
    }

    /// ID key first, composite fallback second, `None` when neither is derivable.
    pub fn resolve_key(&self, row: &[Option<Value>]) -> Option<IdentityKey> {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).and_then(Option::as_ref);
        if let Some(digits) = national_id_of(cell(self.id)) {
            return Some(IdentityKey::NationalId(digits));
        }
        if self.name.is_some() && self.team.is_some() {
            return composite_key(cell(self.name), cell(self.team));
        }
        None
    }
}
