//! Maintenance document lookup.
//!
//! A catalog key matches an equipment identifier when the key is a
//! substring of it, so `PMP-001-EAST` finds the `PMP-001` manual. When
//! several keys match, the longest wins and equal lengths fall back to key
//! order. A miss is a normal result (`found: false`), not an error.

pub mod knowledge_base;
pub mod tool;

use serde::{Deserialize, Serialize};

pub use knowledge_base::{CatalogEntry, KnowledgeBase, KnowledgeBaseError};
pub use tool::RetrieverTool;

/// Outcome of a lookup, as returned to the model by the retriever tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_excerpts: Option<String>,
}

impl RetrievalResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            document_name: None,
            relevant_excerpts: None,
        }
    }
}

/// Read-only lookup over a [`KnowledgeBase`].
#[derive(Debug, Clone, Default)]
pub struct DocumentRetriever {
    kb: KnowledgeBase,
}

impl DocumentRetriever {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }

    pub fn builtin() -> Self {
        Self::new(KnowledgeBase::builtin())
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Look up the document for `equipment`.
    pub fn retrieve(&self, equipment: &str) -> RetrievalResult {
        let hit = self
            .kb
            .iter()
            .filter(|(key, _)| equipment.contains(key))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)));

        match hit {
            Some((key, entry)) => {
                tracing::debug!(equipment, key, manual = %entry.manual, "document found");
                RetrievalResult {
                    found: true,
                    document_name: Some(entry.manual.clone()),
                    relevant_excerpts: Some(entry.content.clone()),
                }
            }
            None => {
                tracing::debug!(equipment, "no document found");
                RetrievalResult::not_found()
            }
        }
    }
}
