//! Core data models shared by the crawler, normalizer, and corpus.

use serde::{Deserialize, Serialize};

/// One unit of normalized text with its provenance.
///
/// Construct through [`CorpusEntry::new`], which refuses empty ids and
/// empty text so that blank entries never reach a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub source_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CorpusEntry {
    /// Returns `None` when either `source_id` or `text` is blank.
    pub fn new(
        source_id: impl Into<String>,
        text: impl Into<String>,
        label: Option<String>,
    ) -> Option<Self> {
        let source_id = source_id.into();
        let text = text.into();
        if source_id.trim().is_empty() || text.trim().is_empty() {
            return None;
        }
        Some(Self {
            source_id,
            text,
            label,
        })
    }

    /// The label if present, otherwise the source id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.source_id)
    }
}

/// An uploaded file: its name, declared content type, and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedBlob {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedBlob {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}
