//! In-memory corpus: ordered entries, substring search, context packaging,
//! and flat JSON export.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::CorpusEntry;

/// What happens when an incoming entry shares a `source_id` with an
/// existing one.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Keep both; duplicates coexist in insertion order.
    #[default]
    Append,
    /// Drop the earlier entries, then append the new one.
    Replace,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    policy: MergePolicy,
}

impl Corpus {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds one entry under the corpus merge policy.
    pub fn insert(&mut self, entry: CorpusEntry) {
        if self.policy == MergePolicy::Replace {
            self.entries.retain(|e| e.source_id != entry.source_id);
        }
        self.entries.push(entry);
    }

    /// Adds every entry of `incoming`, in order.
    pub fn merge<I: IntoIterator<Item = CorpusEntry>>(&mut self, incoming: I) {
        for entry in incoming {
            self.insert(entry);
        }
    }

    /// Entries whose text contains `query`, ignoring case, in insertion order.
    ///
    /// The query is matched as given, surrounding spaces included; a
    /// whitespace-only query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&CorpusEntry> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.text.to_lowercase().contains(&needle))
            .collect()
    }

    /// Unique source ids in insertion order.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .map(|e| e.source_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// The corpus as a pretty-printed JSON array of `{id, text, metadata}`
    /// records. `metadata.label` is omitted for unlabeled entries.
    pub fn to_json_pretty(&self) -> Result<String> {
        let records: Vec<ExportRecord> = self.entries.iter().map(ExportRecord::from).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Writes [`Corpus::to_json_pretty`] to `path`.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write corpus export: {}", path.display()))?;
        Ok(())
    }

    /// Loads `path` when it exists, otherwise starts empty.
    pub fn open(path: Option<&Path>, policy: MergePolicy) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::import_json(p, policy),
            _ => Ok(Self::new(policy)),
        }
    }

    /// Reads an export produced by [`Corpus::export_json`]. Blank records
    /// are skipped; the rest are merged under `policy`.
    pub fn import_json(path: &Path, policy: MergePolicy) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        let records: Vec<ExportRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse corpus file: {}", path.display()))?;
        let mut corpus = Corpus::new(policy);
        corpus.merge(
            records
                .into_iter()
                .filter_map(|r| CorpusEntry::new(r.id, r.text, r.metadata.label)),
        );
        Ok(corpus)
    }
}

/// Renders entries as LLM context.
///
/// Each entry becomes `Source: {id}\nContent: {text}...` with the text cut
/// to `max_chars_per_entry` characters; entries are separated by a blank
/// line.
pub fn as_context<'a, I>(entries: I, max_chars_per_entry: usize) -> String
where
    I: IntoIterator<Item = &'a CorpusEntry>,
{
    entries
        .into_iter()
        .map(|e| {
            format!(
                "Source: {}\nContent: {}...",
                e.source_id,
                truncate_chars(&e.text, max_chars_per_entry)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportRecord {
    id: String,
    text: String,
    #[serde(default)]
    metadata: ExportMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl From<&CorpusEntry> for ExportRecord {
    fn from(entry: &CorpusEntry) -> Self {
        Self {
            id: entry.source_id.clone(),
            text: entry.text.clone(),
            metadata: ExportMetadata {
                label: entry.label.clone(),
            },
        }
    }
}
