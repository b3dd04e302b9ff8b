//! Card Loading
//!
//! Reads card documents from YAML or JSON files into generic trees. Nothing
//! here validates; the loader only decides what is a card document.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CardError, Result};

/// Directories never scanned for cards
const SKIP_DIRS: [&str; 4] = ["target", ".git", "node_modules", ".cargo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

/// A parsed document and where it came from
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub document: Value,
}

/// A file that looked like a card but could not be parsed
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Everything found under a directory
#[derive(Debug, Clone, Default)]
pub struct CardSet {
    pub documents: Vec<LoadedDocument>,
    pub failures: Vec<LoadFailure>,
}

impl CardSet {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn parse_document(text: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => Ok(serde_json::from_str(text)?),
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
            Ok(serde_json::to_value(yaml)?)
        }
    }
}

pub fn load_file(path: &Path) -> Result<Value> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| {
        CardError::InvalidFormat(format!(
            "{}: expected a .yaml, .yml or .json file",
            path.display()
        ))
    })?;
    let text = fs::read_to_string(path)?;
    parse_document(&text, format)
}

/// A mapping with an `abc_version` key
pub fn is_card_document(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|map| map.contains_key("abc_version"))
}

/// Load every card document under a directory, sorted by path
pub fn load_dir(dir: &Path) -> Result<CardSet> {
    if !dir.is_dir() {
        return Err(CardError::InvalidFormat(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !SKIP_DIRS.iter().any(|skip| e.file_name() == *skip)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| DocumentFormat::from_path(p).is_some())
        .collect();
    paths.sort();

    let mut set = CardSet::default();
    for path in paths {
        match load_file(&path) {
            Ok(document) if is_card_document(&document) => {
                set.documents.push(LoadedDocument { path, document });
            }
            Ok(_) => {
                tracing::trace!(path = %path.display(), "skipping non-card document");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse document");
                set.failures.push(LoadFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        cards = set.documents.len(),
        failures = set.failures.len(),
        "loaded card directory"
    );

    Ok(set)
}

/// Load a path that is either a single card file or a directory of cards
pub fn load_path(path: &Path) -> Result<CardSet> {
    if path.is_dir() {
        return load_dir(path);
    }
    let document = load_file(path)?;
    Ok(CardSet {
        documents: vec![LoadedDocument {
            path: path.to_path_buf(),
            document,
        }],
        failures: Vec::new(),
    })
}
