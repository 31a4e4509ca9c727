//! Run configuration loaded from YAML.
//!
//! Every field has a default, so an absent or partial file still yields a
//! usable [`Settings`]. The per-report column lists seed the dialect sniffer's
//! header vocabulary for files of that origin.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    consolidate::OutputLayout,
    dialect::{self, DEFAULT_MIN_FILE_BYTES, SniffOptions, Vocabulary},
    export::DEFAULT_OUTPUT_FILE,
    identity::IdentityAliases,
};

pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder the consolidated table is written to; defaults to the scanned root.
    pub destination: Option<PathBuf>,
    pub output_file_name: String,
    pub min_file_bytes: u64,
    pub extensions: Vec<String>,
    pub root_label: String,
    pub date_column: String,
    pub provenance_column: String,
    pub source_files_prefix: String,
    pub identity: IdentityAliases,
    /// Expected columns per report type, keyed by origin (folder) name.
    pub report_columns: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination: None,
            output_file_name: DEFAULT_OUTPUT_FILE.to_string(),
            min_file_bytes: DEFAULT_MIN_FILE_BYTES,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            root_label: "Raiz".to_string(),
            date_column: "Data".to_string(),
            provenance_column: "_source_files".to_string(),
            source_files_prefix: "Arquivo_".to_string(),
            identity: IdentityAliases::default(),
            report_columns: default_report_columns(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings: Settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings YAML {path:?}"))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.identity.id.is_empty()
                && !self.identity.name.is_empty()
                && !self.identity.team.is_empty(),
            "Identity aliases must list at least one column for id, name and team"
        );
        ensure!(
            !self.output_file_name.trim().is_empty(),
            "Output file name cannot be empty"
        );
        ensure!(
            !self.date_column.trim().is_empty() && !self.provenance_column.trim().is_empty(),
            "Date and provenance column names cannot be empty"
        );
        Ok(())
    }

    pub fn destination_or(&self, fallback: &Path) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn output_layout(&self) -> OutputLayout {
        let first = |aliases: &[String], fallback: &str| {
            aliases
                .first()
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        OutputLayout {
            id_column: first(&self.identity.id, "CPF"),
            name_column: first(&self.identity.name, "Nome"),
            team_column: first(&self.identity.team, "Equipe"),
            date_column: self.date_column.clone(),
            provenance_column: self.provenance_column.clone(),
            source_files_prefix: self.source_files_prefix.clone(),
            root_label: self.root_label.clone(),
        }
    }

    /// Sniffer options for one file: size guard, name-derived header hint and
    /// the origin's configured columns added to the standard vocabulary.
    pub fn sniff_options_for(&self, origin: &str, file_name: &str) -> SniffOptions {
        let mut vocabulary = Vocabulary::standard();
        if let Some(columns) = self.expected_columns(origin) {
            vocabulary = vocabulary.with_columns(columns);
        }
        SniffOptions {
            min_file_bytes: self.min_file_bytes,
            header_hint: dialect::header_hint_for(file_name),
            vocabulary,
            ..SniffOptions::default()
        }
    }

    fn expected_columns(&self, origin: &str) -> Option<&Vec<String>> {
        let leaf = origin.rsplit('/').next().unwrap_or(origin);
        self.report_columns.get(origin).or_else(|| {
            self.report_columns
                .iter()
                .find(|(report, _)| report.eq_ignore_ascii_case(leaf))
                .map(|(_, columns)| columns)
        })
    }
}

fn default_report_columns() -> BTreeMap<String, Vec<String>> {
    let reports: &[(&str, &[&str])] = &[
        ("Absenteísmo", &["Nome", "Equipe", "Previsto", "Ausência", "Presença", "ABS"]),
        ("Auditoria", &["Nome", "Data", "Ocorrência", "Valor"]),
        ("Banco de horas", &["Nome", "Equipe", "Data", "Saldo de B. H."]),
        (
            "Jornada (espelho ponto)",
            &[
                "Data",
                "Nome",
                "Cargo",
                "Equipe",
                "Turno",
                "Pontos",
                "Totais da jornada",
                "Total de H. extras",
                "Saldo",
                "Motivo/Observação",
            ],
        ),
        ("Faltas", &["Nome", "Equipe", "Data", "Motivo"]),
        (
            "Solicitações",
            &[
                "Nome",
                "Cargo",
                "Equipe",
                "Data",
                "Pontos",
                "Status",
                "Tipo de solicitação",
                "Quem aprovou/reprovou",
                "Data da criação",
                "Data da alteração",
                "Observação",
                "Motivo",
                "É atestado?",
                "CID",
                "Motivo da reprovação",
            ],
        ),
        (
            "Afastamentos e férias",
            &[
                "Nome",
                "Equipe",
                "Data inicial",
                "Data final",
                "Observação",
                "Quant. de dias",
                "É atestado?",
            ],
        ),
        ("Assinaturas", &["Nome", "Equipe", "Assinado?", "Data da assinatura"]),
        (
            "Colaboradores",
            &[
                "Nome",
                "PIS",
                "Cargo",
                "Equipe",
                "Turno",
                "CPF",
                "E-mail",
                "Centro de custo",
                "Data de admissão",
            ],
        ),
    ];
    reports
        .iter()
        .map(|(report, columns)| {
            (
                report.to_string(),
                columns.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}
