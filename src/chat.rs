//! `site-chat ask` and `site-chat chat`: answer questions from a corpus.
//!
//! Both commands resolve the API credential before anything else, so a
//! missing key stops the process before any crawl, upload, or prompt.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::answer::{ApiKey, OpenAiClient};
use crate::config::{Config, LlmConfig};
use crate::corpus::Corpus;
use crate::crawl_cmd::{crawl_config, crawl_into};
use crate::ingest::{collect_files, ingest_files};
use crate::session::{ChatTurn, ContextMode, Session};

/// Where a chat session's corpus comes from.
pub struct CorpusSources<'a> {
    pub corpus_path: Option<&'a Path>,
    pub crawl: bool,
    pub files: &'a [PathBuf],
}

pub fn connect(llm: &LlmConfig) -> Result<OpenAiClient> {
    let key = ApiKey::from_env(&llm.api_key_env)
        .with_context(|| "An API key for the completion service is required")?;
    Ok(OpenAiClient::new(llm, key)?)
}

/// Loads, crawls, and uploads into a fresh session.
pub fn build_session(config: &Config, sources: &CorpusSources<'_>) -> Result<Session> {
    let corpus = Corpus::open(sources.corpus_path, config.corpus.merge_policy)?;
    let mut session = Session::with_corpus(corpus, &config.corpus);
    if sources.crawl {
        crawl_into(&mut session, crawl_config(config)?)?;
    }
    if !sources.files.is_empty() {
        let files = collect_files(sources.files, &config.corpus.include_globs)?;
        ingest_files(&mut session, &files)?;
    }
    if session.corpus().is_empty() {
        bail!("The corpus is empty. Pass --corpus, --crawl, or --files to load some content.");
    }
    tracing::info!(entries = session.corpus().len(), "corpus ready");
    Ok(session)
}

fn context_mode(config: &Config, whole: bool) -> ContextMode {
    if whole {
        ContextMode::Whole
    } else {
        config.corpus.context_mode
    }
}

pub fn run_ask(config: &Config, question: &str, sources: &CorpusSources<'_>, whole: bool) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    let client = connect(&config.llm)?;
    let mut session = build_session(config, sources)?;
    let turn = session.ask(question, context_mode(config, whole), &client, &config.llm);
    print_turn(turn);
    Ok(())
}

/// Line-oriented session on stdin. `:history` lists past turns, `:quit` exits.
pub fn run_chat(config: &Config, sources: &CorpusSources<'_>, whole: bool) -> Result<()> {
    let client = connect(&config.llm)?;
    let mut session = build_session(config, sources)?;
    let mode = context_mode(config, whole);
    let interactive = atty::is(atty::Stream::Stdin);

    if interactive {
        println!(
            "{} entries from {} sources loaded. Ask a question, `:history` to review, `:quit` to exit.",
            session.corpus().len(),
            session.corpus().sources().len()
        );
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        match question {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":history" => {
                for turn in session.history() {
                    print_turn(turn);
                }
                continue;
            }
            _ => {}
        }
        let turn = session.ask(question, mode, &client, &config.llm);
        print_turn(turn);
    }
    Ok(())
}

fn print_turn(turn: &ChatTurn) {
    if let crate::answer::Answer::Unavailable { reason } = &turn.answer {
        tracing::warn!("completion failed: {}", reason);
    }
    if turn.omitted_entries > 0 {
        tracing::warn!(
            "{} matching entries left out of the context; raise corpus.context_max_entries to include them",
            turn.omitted_entries
        );
    }
    println!("Question: {}", turn.question);
    println!("Answer: {}", turn.answer);
    if !turn.sources.is_empty() {
        println!("Sources: {}", turn.sources.join(", "));
    }
    println!();
}
