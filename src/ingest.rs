//! Upload ingestion: files and directories → normalized corpus entries.
//!
//! Directories are walked recursively and filtered with
//! `corpus.include_globs`; files named explicitly are always taken. Each
//! file becomes an [`UploadedBlob`] whose content type comes from its
//! extension, then flows through [`Session::upload`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Config;
use crate::corpus::Corpus;
use crate::models::UploadedBlob;
use crate::normalize::content_type_for_path;
use crate::session::Session;

/// Counts reported after an ingest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub entries_added: usize,
    pub skipped: usize,
}

/// Expands `paths` into the list of files to upload, sorted per directory.
pub fn collect_files(paths: &[PathBuf], include_globs: &[String]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(include_globs)?;
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            bail!("No such file or directory: {}", path.display());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
            if include_set.is_match(relative) {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Reads a file into an upload named after its file name.
pub fn read_upload(path: &Path) -> Result<UploadedBlob> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedBlob::new(name, content_type_for_path(path), bytes))
}

/// Uploads every file into the session. Unreadable or empty files are
/// logged and skipped.
pub fn ingest_files(session: &mut Session, files: &[PathBuf]) -> Result<IngestStats> {
    let mut stats = IngestStats::default();
    for path in files {
        stats.files += 1;
        let blob = read_upload(path)?;
        match session.upload(&blob) {
            Ok(n) => {
                tracing::debug!(file = %path.display(), entries = n, "file ingested");
                stats.entries_added += n;
            }
            Err(e) => {
                tracing::warn!("skipped {}: {}", path.display(), e);
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

/// `site-chat ingest`: merge uploads into a corpus file.
pub fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
    corpus_path: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let files = collect_files(paths, &config.corpus.include_globs)?;
    let corpus = Corpus::open(corpus_path, config.corpus.merge_policy)?;
    let mut session = Session::with_corpus(corpus, &config.corpus);

    let stats = ingest_files(&mut session, &files)?;
    session.corpus().export_json(out)?;

    println!("ingest");
    println!("  files: {}", stats.files);
    println!("  entries added: {}", stats.entries_added);
    println!("  skipped: {}", stats.skipped);
    println!("  corpus entries: {}", session.corpus().len());
    println!("  written: {}", out.display());
    println!("ok");
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
