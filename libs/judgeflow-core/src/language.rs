//! Language name to engine id resolution.
//!
//! The lookup is case-insensitive and alias aware. An unknown name is
//! `None`; callers turn that into [`JudgeError::UnsupportedLanguage`]
//! rather than falling back to a default.
//!
//! [`JudgeError::UnsupportedLanguage`]: crate::JudgeError::UnsupportedLanguage

use judgeflow_common::types::LanguageId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Judge0 CE ids
pub const CPP_ID: LanguageId = 52;
pub const JAVA_ID: LanguageId = 62;
pub const JAVASCRIPT_ID: LanguageId = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub name: String,
    pub id: LanguageId,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageEntry>,
}

#[derive(Debug, Error)]
pub enum LanguageTableError {
    #[error("failed to read language table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse language table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("language table is empty")]
    Empty,

    #[error("language '{name}' has invalid id {id}")]
    InvalidId { name: String, id: LanguageId },

    #[error("language name or alias '{0}' is defined more than once")]
    Duplicate(String),
}

/// Read-only lookup table from language names and aliases to engine ids
#[derive(Debug, Clone)]
pub struct LanguageTable {
    entries: Vec<LanguageEntry>,
    index: HashMap<String, LanguageId>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl LanguageTable {
    /// The table the engine integration ships with
    pub fn builtin() -> Self {
        let entries = vec![
            LanguageEntry {
                name: "cpp".to_string(),
                id: CPP_ID,
                aliases: vec!["c++".to_string()],
            },
            LanguageEntry {
                name: "java".to_string(),
                id: JAVA_ID,
                aliases: vec![],
            },
            LanguageEntry {
                name: "javascript".to_string(),
                id: JAVASCRIPT_ID,
                aliases: vec!["js".to_string()],
            },
        ];
        // builtin entries are known to be valid
        Self::from_entries(entries).unwrap_or_else(|_| unreachable!("builtin language table is valid"))
    }

    pub fn from_entries(entries: Vec<LanguageEntry>) -> Result<Self, LanguageTableError> {
        if entries.is_empty() {
            return Err(LanguageTableError::Empty);
        }

        let mut index = HashMap::new();
        for entry in &entries {
            if entry.id == 0 {
                return Err(LanguageTableError::InvalidId {
                    name: entry.name.clone(),
                    id: entry.id,
                });
            }
            for name in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let key = normalize(name);
                if index.insert(key.clone(), entry.id).is_some() {
                    return Err(LanguageTableError::Duplicate(key));
                }
            }
        }

        Ok(Self { entries, index })
    }

    /// Load a table from a JSON file of the form
    /// `{"languages": [{"name": "cpp", "id": 54, "aliases": ["c++"]}]}`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LanguageTableError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LanguageTableError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: LanguagesFile = serde_json::from_str(&content)?;
        Self::from_entries(file.languages)
    }

    pub fn resolve(&self, name: &str) -> Option<LanguageId> {
        self.index.get(&normalize(name)).copied()
    }

    pub fn entries(&self) -> &[LanguageEntry] {
        &self.entries
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

static BUILTIN: OnceLock<LanguageTable> = OnceLock::new();

/// Process-wide builtin table
pub fn builtin_table() -> &'static LanguageTable {
    BUILTIN.get_or_init(LanguageTable::builtin)
}

/// Resolve against the builtin table
pub fn resolve(name: &str) -> Option<LanguageId> {
    builtin_table().resolve(name)
}
