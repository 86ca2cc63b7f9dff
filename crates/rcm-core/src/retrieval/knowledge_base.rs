//! Catalog of equipment maintenance documents.
//!
//! Entries are keyed by equipment tag. The built-in catalog ships two
//! reference manuals; operators can replace it with a TOML file:
//!
//! ```toml
//! [entries."PMP-001"]
//! manual = "KSB-001 Centrifugal Pump Manual.pdf"
//! content = """
//! - Vibration inspection every 500 operating hours.
//! """
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a catalog file.
#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("failed to read knowledge base {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse knowledge base: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("knowledge base entry {0:?} has a blank key")]
    BlankKey(String),
}

/// One catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Document name, e.g. a PDF file name.
    pub manual: String,
    /// Relevant excerpts: procedures, limits, frequencies, costs.
    pub content: String,
}

/// Equipment tag -> maintenance document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    entries: BTreeMap<String, CatalogEntry>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two reference entries shipped with the tool.
    pub fn builtin() -> Self {
        let mut kb = Self::new();
        kb.insert(
            "PMP-001",
            CatalogEntry {
                manual: "KSB-001 Centrifugal Pump Manual.pdf".to_string(),
                content: PUMP_EXCERPTS.trim().to_string(),
            },
        );
        kb.insert(
            "MOTOR-ELET-01",
            CatalogEntry {
                manual: "WEG W22 Electric Motor Manual.pdf".to_string(),
                content: MOTOR_EXCERPTS.trim().to_string(),
            },
        );
        kb
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, KnowledgeBaseError> {
        let kb: Self = toml::from_str(raw)?;
        if let Some(key) = kb.entries.keys().find(|k| k.trim().is_empty()) {
            return Err(KnowledgeBaseError::BlankKey(key.clone()));
        }
        Ok(kb)
    }

    /// Load a catalog from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, KnowledgeBaseError> {
        let raw = std::fs::read_to_string(path).map_err(|source| KnowledgeBaseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), entries = kb.len(), "loaded knowledge base");
        Ok(kb)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.insert(key.into(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const PUMP_EXCERPTS: &str = r#"
### Section 5.2: Preventive Maintenance
- **Vibration inspection:** Every 500 operating hours. Vibration must not exceed 4.5 mm/s (RMS). Estimated sensor cost: $150.
- **Bearing lubrication:** Use "Polyrex EM" grease every 2000 hours. Cost: $30 per application.
- **Mechanical seal check:** Visually inspect for leaks every 1000 hours. Replace on continuous dripping. Replacement cost: $450.
- **Oil analysis:** Collect a sample every 4000 hours for spectrometric analysis. Analysis cost: $100.
"#;

const MOTOR_EXCERPTS: &str = r#"
### Chapter 8: Maintenance Procedures
- **Insulation measurement:** Megger test yearly. Resistance must exceed 1 gigaohm. Test cost: $250.
- **Frame cleaning:** Keep the frame free of dust and debris to preserve heat dissipation. Weekly. Cost: labor.
- **Terminal check:** Retighten electrical connections every 6 months to prevent poor contact and overheating. Cost: labor.
"#;
