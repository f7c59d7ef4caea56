//! `site-chat crawl`: run the configured crawl and write the corpus.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::config::{Config, CrawlConfig};
use crate::corpus::Corpus;
use crate::crawl::{CrawlReport, Crawler};
use crate::session::Session;

pub fn crawl_config(config: &Config) -> Result<&CrawlConfig> {
    config
        .crawl
        .as_ref()
        .ok_or_else(|| anyhow!("Crawling is not configured. Add a [crawl] section with seeds and scope_prefix."))
}

/// Crawls with `crawl` and merges the results into `session`.
///
/// Per-page failures are logged as warnings; they never fail the run.
pub fn crawl_into(session: &mut Session, crawl: &CrawlConfig) -> Result<CrawlReport> {
    let crawler = Crawler::from_config(crawl)?;
    let report = crawler.crawl(crawl.seeds.as_slice(), &crawl.scope_prefix);
    for failure in &report.failures {
        tracing::warn!("crawl {}: {}", failure.url, failure.error);
    }
    if report.truncated() {
        tracing::warn!(
            "page cap of {} reached; {} discovered pages were not fetched",
            crawl.max_pages,
            report.unvisited.len()
        );
    }
    session.add_crawl(&report);
    Ok(report)
}

pub fn run_crawl(config: &Config, corpus_path: Option<&Path>, out: &Path) -> Result<()> {
    let crawl = crawl_config(config)?;
    let corpus = Corpus::open(corpus_path, config.corpus.merge_policy)?;
    let mut session = Session::with_corpus(corpus, &config.corpus);

    let report = crawl_into(&mut session, crawl)?;
    session.corpus().export_json(out)?;

    println!("crawl {}", crawl.scope_prefix);
    println!("  pages visited: {}", report.visited.len());
    println!("  entries: {}", report.entries.len());
    println!("  failures: {}", report.failures.len());
    if report.truncated() {
        println!("  not fetched (page cap): {}", report.unvisited.len());
    }
    println!("  corpus entries: {}", session.corpus().len());
    println!("  written: {}", out.display());
    println!("ok");
    Ok(())
}
