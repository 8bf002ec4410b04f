//! Loads record manifests from a directory of YAML files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::resource::{AnyRecord, RecordKey};
use crate::store::{RecordStore, StoreError};
use crate::validation::RecordValidator;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Duplicate record: {0}")]
    Duplicate(RecordKey),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

/// A record and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub record: AnyRecord,
    /// Path relative to the manifest directory.
    pub path: PathBuf,
}

/// Reads records from `.yaml` and `.yml` files below a directory.
pub struct ManifestLoader {
    root: PathBuf,
}

impl ManifestLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads and validates every record, sorted by key.
    pub fn load(&self) -> Result<Vec<ManifestEntry>> {
        if !self.root.is_dir() {
            return Err(ManifestError::DirectoryNotFound(self.root.clone()));
        }

        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| ManifestError::ReadDirectory {
                path: self.root.clone(),
                source: e,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let hidden = relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            });
            if hidden {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "yaml" && ext != "yml" {
                continue;
            }

            for record in self.load_file(path)? {
                let key = record.key();
                if !seen.insert(key.clone()) {
                    return Err(ManifestError::Duplicate(key));
                }
                entries.push(ManifestEntry {
                    record,
                    path: relative.to_path_buf(),
                });
            }
        }

        RecordValidator::new()
            .validate(entries.iter().map(|e| &e.record))
            .map_err(ManifestError::Validation)?;

        entries.sort_by_key(|e| e.record.key());
        log::info!(
            "Loaded {} record(s) from {}",
            entries.len(),
            self.root.display()
        );
        Ok(entries)
    }

    /// Reads every record in one file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<AnyRecord>> {
        let content = fs::read_to_string(path).map_err(|e| ManifestError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        parse_documents(&content, path)
    }

    /// Creates every loaded record in `store`. Records already present are left alone.
    ///
    /// Returns the number of records created.
    pub async fn seed(&self, store: &dyn RecordStore) -> Result<usize> {
        let mut created = 0;
        for entry in self.load()? {
            let key = entry.record.key();
            match store.create(entry.record).await {
                Ok(_) => created += 1,
                Err(StoreError::AlreadyExists(_)) => {
                    log::debug!("{} already stored, leaving it as is", key);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }
}

/// Parses a possibly multi-document YAML string. Empty documents are skipped.
pub fn parse_documents(content: &str, path: &Path) -> Result<Vec<AnyRecord>> {
    let parse_error = |e: serde_yaml::Error| ManifestError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut records = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document).map_err(parse_error)?;
        if value.is_null() {
            continue;
        }
        let record: AnyRecord = serde_yaml::from_value(value).map_err(parse_error)?;
        records.push(record);
    }
    Ok(records)
}
