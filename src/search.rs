//! `site-chat search`: case-insensitive substring search over a corpus file.

use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::corpus::Corpus;

/// Characters of context shown before a match in a snippet.
const SNIPPET_LEAD: usize = 40;
const SNIPPET_WIDTH: usize = 160;

pub fn run_search(config: &Config, query: &str, corpus_path: &Path, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let corpus = Corpus::open(Some(corpus_path), config.corpus.merge_policy)?;
    let hits = corpus.search(query);
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let shown = limit.unwrap_or(hits.len()).min(hits.len());
    for (i, entry) in hits.iter().take(shown).enumerate() {
        println!("{}. {}", i + 1, entry.display_name());
        println!("    source: {}", entry.source_id);
        println!("    > {}", snippet(&entry.text, query));
        println!();
    }
    println!("{} of {} matching entries", shown, hits.len());
    Ok(())
}

/// A window of `text` around the first case-insensitive occurrence of `query`.
pub fn snippet(text: &str, query: &str) -> String {
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    let chars: Vec<char> = text.chars().collect();
    let position = (0..chars.len())
        .find(|&i| starts_with_ignore_case(&chars[i..], &needle))
        .unwrap_or(0);

    let start = position.saturating_sub(SNIPPET_LEAD);
    let end = (start + SNIPPET_WIDTH).min(chars.len());
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

fn starts_with_ignore_case(hay: &[char], needle_lower: &[char]) -> bool {
    let mut lowered = hay.iter().flat_map(|c| c.to_lowercase());
    needle_lower.iter().all(|n| lowered.next() == Some(*n))
}
