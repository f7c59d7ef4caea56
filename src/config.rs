//! TOML configuration parsing and validation.
//!
//! A configuration file has three sections:
//!
//! ```toml
//! [crawl]
//! seeds = ["https://docs.example.org/lab/index.html"]
//! scope_prefix = "https://docs.example.org/lab"
//!
//! [corpus]
//! merge_policy = "append"
//!
//! [llm]
//! model = "gpt-4o-mini"
//! ```
//!
//! `[crawl]` is optional: without it the `crawl` command and `--crawl`
//! flags are unavailable. `[corpus]` and `[llm]` fall back to defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::corpus::MergePolicy;
use crate::crawl::canonical_prefix;
use crate::session::ContextMode;

/// Smallest accepted value for `crawl.min_chars`.
pub const MIN_CHARS_FLOOR: usize = 30;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub crawl: Option<CrawlConfig>,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Traversal discipline for the crawl frontier.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrawlOrder {
    /// Breadth-first: oldest discovered URL first.
    #[default]
    Fifo,
    /// Depth-first: newest discovered URL first.
    Lifo,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    pub seeds: Vec<String>,
    pub scope_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub order: CrawlOrder,
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_min_chars() -> usize {
    50
}
fn default_max_pages() -> usize {
    500
}
fn default_user_agent() -> String {
    concat!("site-chat/", env!("CARGO_PKG_VERSION")).to_string()
}

pub fn default_content_selectors() -> Vec<String> {
    ["main", "div[role='main']", "article", "section", "p", "li"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl CrawlConfig {
    /// A crawl configuration with defaults for everything but the seeds and scope.
    pub fn new(seeds: Vec<String>, scope_prefix: impl Into<String>) -> Self {
        Self {
            seeds,
            scope_prefix: scope_prefix.into(),
            timeout_secs: default_timeout_secs(),
            min_chars: default_min_chars(),
            max_pages: default_max_pages(),
            delay_ms: 0,
            order: CrawlOrder::default(),
            content_selectors: default_content_selectors(),
            user_agent: default_user_agent(),
        }
    }
}

/// How spreadsheet (`.xlsx`) and CSV uploads become corpus entries.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpreadsheetMode {
    /// One entry for the whole first sheet or CSV file.
    #[default]
    File,
    /// One entry per non-empty data row; the header row is skipped.
    Rows,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default)]
    pub spreadsheet_mode: SpreadsheetMode,
    #[serde(default)]
    pub context_mode: ContextMode,
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
    #[serde(default = "default_context_max_entries")]
    pub context_max_entries: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            spreadsheet_mode: SpreadsheetMode::default(),
            context_mode: ContextMode::default(),
            context_max_chars: default_context_max_chars(),
            context_max_entries: default_context_max_entries(),
            max_upload_bytes: default_max_upload_bytes(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_context_max_chars() -> usize {
    1000
}
fn default_context_max_entries() -> usize {
    20
}
fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_include_globs() -> Vec<String> {
    [
        "**/*.xlsx", "**/*.csv", "**/*.pdf", "**/*.xml", "**/*.docx", "**/*.doc", "**/*.txt",
        "**/*.md",
    ]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_llm_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if let Some(crawl) = &config.crawl {
        if crawl.seeds.is_empty() {
            bail!("crawl.seeds must contain at least one URL");
        }
        if crawl.scope_prefix.trim().is_empty() {
            bail!("crawl.scope_prefix must not be empty");
        }
        url::Url::parse(crawl.scope_prefix.trim())
            .with_context(|| format!("Invalid crawl.scope_prefix: {}", crawl.scope_prefix))?;
        let scope = canonical_prefix(&crawl.scope_prefix);
        for seed in &crawl.seeds {
            let mut seed_url =
                url::Url::parse(seed).with_context(|| format!("Invalid crawl seed: {}", seed))?;
            seed_url.set_fragment(None);
            if !seed_url.as_str().starts_with(&scope) {
                bail!(
                    "crawl seed '{}' is outside scope_prefix '{}'",
                    seed,
                    crawl.scope_prefix
                );
            }
        }
        if crawl.timeout_secs == 0 {
            bail!("crawl.timeout_secs must be > 0");
        }
        if crawl.min_chars < MIN_CHARS_FLOOR {
            bail!("crawl.min_chars must be >= {}", MIN_CHARS_FLOOR);
        }
        if crawl.max_pages == 0 {
            bail!("crawl.max_pages must be > 0");
        }
        if crawl.content_selectors.is_empty() {
            bail!("crawl.content_selectors must not be empty");
        }
        for selector in &crawl.content_selectors {
            if scraper::Selector::parse(selector).is_err() {
                bail!("Invalid CSS selector in crawl.content_selectors: '{}'", selector);
            }
        }
    }

    if config.corpus.context_max_chars == 0 {
        bail!("corpus.context_max_chars must be > 0");
    }
    if config.corpus.context_max_entries == 0 {
        bail!("corpus.context_max_entries must be > 0");
    }

    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if !(0.0..=0.5).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 0.5]");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }

    Ok(())
}
