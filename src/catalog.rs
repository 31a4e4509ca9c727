//! File enumeration: which exports feed a run and which origin each belongs to.

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use anyhow::{Result, ensure};
use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One input file and the origin (report-type folder) it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Relative folder path with `/` separators; empty for files at the root.
    pub origin: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, origin: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.origin.is_empty()
    }
}

pub trait FileCatalog {
    fn list_files(&self) -> Result<Vec<SourceFile>>;
}

/// Recursive scan of a root folder; each file's origin is its parent folder
/// relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
    extensions: Vec<String>,
    excluded_names: Vec<String>,
}

impl DirectoryCatalog {
    pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, extensions: &[S]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_names: Vec::new(),
        }
    }

    /// Skips files with this exact name, e.g. a previous run's output.
    pub fn excluding(mut self, file_name: impl Into<String>) -> Self {
        self.excluded_names.push(file_name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_file() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with("~$") {
            return false;
        }
        if self
            .excluded_names
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(&name))
        {
            debug!("Skipping excluded file {name}");
            return false;
        }
        entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    fn origin_of(&self, path: &Path) -> String {
        path.parent()
            .and_then(|parent| parent.strip_prefix(&self.root).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

impl FileCatalog for DirectoryCatalog {
    fn list_files(&self) -> Result<Vec<SourceFile>> {
        ensure!(
            self.root.is_dir(),
            "Catalog root {:?} is not a directory",
            self.root
        );
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable catalog entry: {err}");
                    continue;
                }
            };
            if self.accepts(&entry) {
                let path = entry.into_path();
                let origin = self.origin_of(&path);
                files.push(SourceFile { path, origin });
            }
        }
        files.sort_by(compare_source_files);
        debug!("Catalog {:?} lists {} file(s)", self.root, files.len());
        Ok(files)
    }
}

fn compare_source_files(a: &SourceFile, b: &SourceFile) -> Ordering {
    a.origin
        .cmp(&b.origin)
        .then_with(|| a.file_name().cmp(&b.file_name()))
}
