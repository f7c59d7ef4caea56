//! `site-chat export`: rewrite a corpus file as a flat JSON array.
//!
//! Loading applies the configured merge policy, so exporting under
//! `merge_policy = "replace"` collapses duplicate source ids to their
//! latest entry.

use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::corpus::Corpus;

pub fn run_export(config: &Config, corpus_path: &Path, out: Option<&Path>) -> Result<()> {
    let corpus = Corpus::import_json(corpus_path, config.corpus.merge_policy)?;
    match out {
        Some(path) => {
            corpus.export_json(path)?;
            eprintln!("Exported {} entries to {}", corpus.len(), path.display());
        }
        None => println!("{}", corpus.to_json_pretty()?),
    }
    Ok(())
}
