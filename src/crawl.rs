//! Frontier-driven site crawler.
//!
//! Walks every page reachable from a set of seed URLs whose address starts
//! with a scope prefix, extracts main-content text from each, and turns
//! pages with enough text into [`CorpusEntry`] values.
//!
//! ```text
//!   seeds ──▶ Frontier ──next()──▶ Fetcher ──▶ html::extract_content_text ──▶ entries
//!                ▲                                │
//!                └──────offer()── html::extract_links
//! ```
//!
//! Pages are fetched one at a time. A failure on one page (network error,
//! non-200 status, non-HTML body) is recorded in the [`CrawlReport`] and the
//! crawl moves on; nothing here logs at warning level or aborts, that is
//! left to the caller.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use scraper::Html;
use thiserror::Error;
use url::Url;

use crate::config::{CrawlConfig, CrawlOrder};
use crate::html::{extract_content_text, extract_links, ContentSelectors};
use crate::models::CorpusEntry;

/// Label prefix for entries produced by the crawler.
pub const WEB_LABEL_PREFIX: &str = "Web content: ";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("URL '{url}' is outside scope '{scope}'")]
    OutOfScope { url: String, scope: String },
    #[error("invalid content selector '{0}'")]
    InvalidSelector(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("not an HTML page ({0})")]
    NotHtml(String),
}

/// A fetched response, reduced to what the crawler needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Address after redirects; relative links resolve against it.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Retrieves a single page. Implemented over HTTP by [`HttpFetcher`].
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError>;
}

/// Blocking HTTP fetcher with a request timeout and redirect following.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = if status == 200 {
            response.text()?
        } else {
            String::new()
        };
        Ok(FetchedPage {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}

/// `prefix` in the form `Url` serializes addresses: lowercase scheme and
/// host, default port dropped. Unparseable prefixes are kept verbatim.
pub fn canonical_prefix(prefix: &str) -> String {
    let prefix = prefix.trim();
    match Url::parse(prefix) {
        Ok(url) => String::from(url),
        Err(_) => prefix.to_string(),
    }
}

/// Discovered-but-unfetched URLs plus the set already fetched.
///
/// Only URLs starting with the scope prefix and not yet visited or queued
/// are accepted, so `visited` and `pending` never overlap.
#[derive(Debug)]
pub struct Frontier {
    scope_prefix: String,
    order: CrawlOrder,
    pending: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    visit_order: Vec<String>,
}

impl Frontier {
    pub fn new(scope_prefix: &str, order: CrawlOrder) -> Self {
        Self {
            scope_prefix: canonical_prefix(scope_prefix),
            order,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            visit_order: Vec::new(),
        }
    }

    pub fn scope_prefix(&self) -> &str {
        &self.scope_prefix
    }

    pub fn in_scope(&self, url: &str) -> bool {
        url.starts_with(&self.scope_prefix)
    }

    /// Queues `url` if it is in scope and unseen. Returns whether it was added.
    pub fn offer(&mut self, url: &str) -> bool {
        if !self.in_scope(url) || self.visited.contains(url) || self.queued.contains(url) {
            return false;
        }
        self.queued.insert(url.to_string());
        self.pending.push_back(url.to_string());
        true
    }

    /// Takes the next URL and marks it visited.
    pub fn next(&mut self) -> Option<String> {
        loop {
            let url = match self.order {
                CrawlOrder::Fifo => self.pending.pop_front(),
                CrawlOrder::Lifo => self.pending.pop_back(),
            }?;
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                self.visit_order.push(url.clone());
                return Some(url);
            }
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    pub fn visited_len(&self) -> usize {
        self.visit_order.len()
    }

    /// Visited URLs in fetch order and whatever was still pending.
    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.visit_order, self.pending.into_iter().collect())
    }
}

/// A page that produced no entry because something went wrong.
#[derive(Debug)]
pub struct PageFailure {
    pub url: String,
    pub error: CrawlError,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub entries: Vec<CorpusEntry>,
    /// Every URL taken from the frontier, in fetch order.
    pub visited: Vec<String>,
    pub failures: Vec<PageFailure>,
    /// URLs still pending when the page cap stopped the crawl.
    pub unvisited: Vec<String>,
}

impl CrawlReport {
    pub fn truncated(&self) -> bool {
        !self.unvisited.is_empty()
    }
}

pub struct Crawler<F: Fetcher> {
    fetcher: F,
    selectors: ContentSelectors,
    min_chars: usize,
    max_pages: usize,
    delay: Duration,
    order: CrawlOrder,
    last_fetch: RefCell<HashMap<String, Instant>>,
}

impl Crawler<HttpFetcher> {
    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        Self::new(HttpFetcher::new(config)?, config)
    }
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(fetcher: F, config: &CrawlConfig) -> Result<Self, CrawlError> {
        let selectors =
            ContentSelectors::parse(&config.content_selectors).map_err(CrawlError::InvalidSelector)?;
        Ok(Self {
            fetcher,
            selectors,
            min_chars: config.min_chars,
            max_pages: config.max_pages,
            delay: Duration::from_millis(config.delay_ms),
            order: config.order,
            last_fetch: RefCell::new(HashMap::new()),
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Crawls from `seeds`, following links that start with `scope_prefix`.
    pub fn crawl<S: AsRef<str>>(&self, seeds: &[S], scope_prefix: &str) -> CrawlReport {
        let mut frontier = Frontier::new(scope_prefix, self.order);
        let mut report = CrawlReport::default();

        for seed in seeds {
            let seed = seed.as_ref();
            match Url::parse(seed) {
                Ok(mut url) => {
                    url.set_fragment(None);
                    if !frontier.in_scope(url.as_str()) {
                        report.failures.push(PageFailure {
                            url: seed.to_string(),
                            error: CrawlError::OutOfScope {
                                url: seed.to_string(),
                                scope: frontier.scope_prefix().to_string(),
                            },
                        });
                        continue;
                    }
                    frontier.offer(url.as_str());
                }
                Err(_) => report.failures.push(PageFailure {
                    url: seed.to_string(),
                    error: CrawlError::InvalidUrl(seed.to_string()),
                }),
            }
        }

        while frontier.visited_len() < self.max_pages {
            let Some(url) = frontier.next() else {
                break;
            };
            match self.visit(&url, &mut frontier) {
                Ok(Some(entry)) => report.entries.push(entry),
                Ok(None) => {}
                Err(error) => {
                    tracing::debug!(url = %url, error = %error, "page skipped");
                    report.failures.push(PageFailure { url, error });
                }
            }
        }

        let (visited, unvisited) = frontier.into_parts();
        report.visited = visited;
        report.unvisited = unvisited;
        tracing::info!(
            visited = report.visited.len(),
            entries = report.entries.len(),
            failures = report.failures.len(),
            unvisited = report.unvisited.len(),
            "crawl finished"
        );
        report
    }

    fn visit(&self, url: &str, frontier: &mut Frontier) -> Result<Option<CorpusEntry>, CrawlError> {
        let parsed = Url::parse(url).map_err(|_| CrawlError::InvalidUrl(url.to_string()))?;
        self.wait_for_host(&parsed);
        let page = self.fetcher.fetch(&parsed)?;
        if page.status != 200 {
            return Err(CrawlError::Status(page.status));
        }
        if let Some(ct) = &page.content_type {
            if !ct.to_ascii_lowercase().contains("html") {
                return Err(CrawlError::NotHtml(ct.clone()));
            }
        }

        let document = Html::parse_document(&page.body);
        let text = extract_content_text(&document, &self.selectors);
        let mut discovered = 0usize;
        for link in extract_links(&document, &page.url) {
            if frontier.offer(link.as_str()) {
                discovered += 1;
            }
        }

        let chars = text.chars().count();
        tracing::debug!(url = %url, chars, discovered, "page fetched");
        if chars <= self.min_chars {
            return Ok(None);
        }
        Ok(CorpusEntry::new(
            url,
            text,
            Some(format!("{}{}", WEB_LABEL_PREFIX, url)),
        ))
    }

    /// Sleeps until `delay` has passed since the last request to this host.
    fn wait_for_host(&self, url: &Url) {
        if self.delay.is_zero() {
            return;
        }
        let host = url.host_str().unwrap_or_default().to_string();
        let mut last_fetch = self.last_fetch.borrow_mut();
        if let Some(last) = last_fetch.get(&host) {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        last_fetch.insert(host, Instant::now());
    }
}
