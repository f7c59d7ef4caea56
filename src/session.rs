//! Per-user session state: the accumulated corpus and the chat history.
//!
//! Every pipeline step takes the session explicitly. Crawl reports and
//! uploads are merged into its corpus; questions are answered from it and
//! recorded as [`ChatTurn`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::answer::{self, Answer, ChatCompletion};
use crate::config::{CorpusConfig, LlmConfig, SpreadsheetMode};
use crate::corpus::{as_context, Corpus};
use crate::crawl::CrawlReport;
use crate::models::{CorpusEntry, UploadedBlob};
use crate::normalize::{self, ExtractError, CELL_SEPARATOR};

/// Sources listed per answer.
const MAX_TURN_SOURCES: usize = 3;

/// Where the context for a question comes from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Entries containing the question; the whole corpus when none do.
    #[default]
    Search,
    /// The whole corpus.
    Whole,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{name} is {size} bytes, over the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("{name}: {source}")]
    Extract {
        name: String,
        #[source]
        source: ExtractError,
    },
    #[error("{0} contains no text")]
    Empty(String),
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    pub answer: Answer,
    pub sources: Vec<String>,
    /// Candidate entries left out by `context_max_entries`.
    pub omitted_entries: usize,
    pub asked_at: DateTime<Utc>,
}

/// Entries chosen as context for one question.
#[derive(Debug)]
pub struct ContextSelection<'a> {
    pub entries: Vec<&'a CorpusEntry>,
    /// Candidates dropped because of the `context_max_entries` cap.
    pub omitted: usize,
}

pub struct Session {
    corpus: Corpus,
    history: Vec<ChatTurn>,
    settings: CorpusConfig,
}

impl Session {
    pub fn new(settings: &CorpusConfig) -> Self {
        Self::with_corpus(Corpus::new(settings.merge_policy), settings)
    }

    pub fn with_corpus(corpus: Corpus, settings: &CorpusConfig) -> Self {
        Self {
            corpus,
            history: Vec::new(),
            settings: settings.clone(),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Merges crawl results. Returns the number of entries added.
    pub fn add_crawl(&mut self, report: &CrawlReport) -> usize {
        let n = report.entries.len();
        self.corpus.merge(report.entries.iter().cloned());
        n
    }

    /// Normalizes one upload into the corpus. Returns the number of entries added.
    pub fn upload(&mut self, blob: &UploadedBlob) -> Result<usize, UploadError> {
        let size = blob.bytes.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(UploadError::TooLarge {
                name: blob.name.clone(),
                size,
                limit: self.settings.max_upload_bytes,
            });
        }
        let extract_err = |source| UploadError::Extract {
            name: blob.name.clone(),
            source,
        };

        let entries: Vec<CorpusEntry> = if self.settings.spreadsheet_mode == SpreadsheetMode::Rows
            && normalize::is_tabular(&blob.content_type)
        {
            normalize::table_rows(&blob.bytes, &blob.content_type)
                .map_err(extract_err)?
                .into_iter()
                .enumerate()
                .filter_map(|(i, cells)| {
                    CorpusEntry::new(
                        format!("{}#row{}", blob.name, i + 1),
                        cells.join(CELL_SEPARATOR),
                        cells.first().cloned(),
                    )
                })
                .collect()
        } else {
            let text = normalize::extract_text(&blob.bytes, &blob.content_type).map_err(extract_err)?;
            CorpusEntry::new(blob.name.clone(), text, Some(blob.name.clone()))
                .into_iter()
                .collect()
        };

        if entries.is_empty() {
            return Err(UploadError::Empty(blob.name.clone()));
        }
        let n = entries.len();
        self.corpus.merge(entries);
        Ok(n)
    }

    /// Entries used as context for `question`.
    ///
    /// Whole mode, and search mode with no match, start from every entry in
    /// corpus order. Either way only the first `context_max_entries` are
    /// kept; the rest are counted in [`ContextSelection::omitted`].
    pub fn context_entries(&self, question: &str, mode: ContextMode) -> ContextSelection<'_> {
        let limit = self.settings.context_max_entries;
        let matches = match mode {
            ContextMode::Search => self.corpus.search(question),
            ContextMode::Whole => Vec::new(),
        };
        let mut candidates = if matches.is_empty() {
            self.corpus.entries().iter().collect()
        } else {
            matches
        };
        let omitted = candidates.len().saturating_sub(limit);
        candidates.truncate(limit);
        ContextSelection {
            entries: candidates,
            omitted,
        }
    }

    /// Answers `question` from the corpus and records the turn.
    pub fn ask(
        &mut self,
        question: &str,
        mode: ContextMode,
        client: &dyn ChatCompletion,
        llm: &LlmConfig,
    ) -> &ChatTurn {
        let ContextSelection { entries, omitted } = self.context_entries(question, mode);
        if omitted > 0 {
            tracing::debug!(kept = entries.len(), omitted, "context capped");
        }
        let context = as_context(entries.iter().copied(), self.settings.context_max_chars);
        let mut sources: Vec<String> = Vec::new();
        for e in &entries {
            if sources.len() == MAX_TURN_SOURCES {
                break;
            }
            if !sources.contains(&e.source_id) {
                sources.push(e.source_id.clone());
            }
        }

        let answer = answer::ask(client, question, &context, &llm.model, llm.temperature);
        self.history.push(ChatTurn {
            question: question.to_string(),
            answer,
            sources,
            omitted_entries: omitted,
            asked_at: Utc::now(),
        });
        &self.history[self.history.len() - 1]
    }
}
