//! # site-chat CLI
//!
//! ```bash
//! site-chat --config ./config/site-chat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `site-chat crawl` | Crawl the configured site into a corpus file |
//! | `site-chat ingest <paths>` | Normalize uploads into a corpus file |
//! | `site-chat search "<query>"` | Substring search over a corpus file |
//! | `site-chat ask "<question>"` | Answer one question from the corpus |
//! | `site-chat chat` | Answer questions read from stdin |
//! | `site-chat export` | Re-export a corpus file as flat JSON |
//! | `site-chat completions <shell>` | Print shell completions |
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use site_chat::chat::{self, CorpusSources};
use site_chat::config;
use site_chat::crawl_cmd;
use site_chat::export;
use site_chat::ingest;
use site_chat::search;

const DEFAULT_CORPUS: &str = "./corpus.json";

/// Crawl, upload, search, and ask questions about a text corpus.
#[derive(Parser)]
#[command(
    name = "site-chat",
    version,
    about = "Crawl a documentation site, normalize uploads, and ask an LLM about the corpus"
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// If the file does not exist, built-in defaults are used and
    /// crawling is unavailable.
    #[arg(long, global = true, default_value = "./config/site-chat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured seeds within the scope prefix.
    ///
    /// Failed pages are logged and skipped. Results are merged into the
    /// corpus file given by `--corpus` (if it exists) and written to `--out`.
    Crawl {
        /// Existing corpus to merge into.
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Where to write the corpus.
        #[arg(long, default_value = DEFAULT_CORPUS)]
        out: PathBuf,
    },

    /// Normalize files (xlsx, csv, pdf, xml, docx, txt, md) into corpus entries.
    ///
    /// Directories are walked and filtered by `corpus.include_globs`.
    Ingest {
        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Existing corpus to merge into.
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Where to write the corpus.
        #[arg(long, default_value = DEFAULT_CORPUS)]
        out: PathBuf,
    },

    /// Case-insensitive substring search.
    Search {
        query: String,
        #[arg(long, default_value = DEFAULT_CORPUS)]
        corpus: PathBuf,
        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask one question.
    ///
    /// Requires the API key named by `llm.api_key_env` (default
    /// `OPENAI_API_KEY`).
    Ask {
        question: String,
        #[command(flatten)]
        input: LoadArgs,
    },

    /// Ask questions read line by line from stdin.
    Chat {
        #[command(flatten)]
        input: LoadArgs,
    },

    /// Rewrite a corpus file as a flat `[{id, text, metadata}]` array.
    Export {
        #[arg(long, default_value = DEFAULT_CORPUS)]
        corpus: PathBuf,
        /// Output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print shell completions.
    Completions { shell: Shell },
}

#[derive(clap::Args)]
struct LoadArgs {
    /// Corpus file to load.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Crawl the configured site before answering.
    #[arg(long)]
    crawl: bool,
    /// Files or directories to upload before answering.
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,
    /// Use the whole corpus as context instead of search matches.
    ///
    /// Still capped at `corpus.context_max_entries` (default 20) entries in
    /// corpus order; a warning reports how many were left out.
    #[arg(long)]
    whole: bool,
}

impl LoadArgs {
    /// Falls back to the default corpus file when nothing else is given.
    fn sources(&self) -> CorpusSources<'_> {
        let corpus_path = match &self.corpus {
            Some(p) => Some(p.as_path()),
            None if !self.crawl && self.files.is_empty() => Some(Path::new(DEFAULT_CORPUS)),
            None => None,
        };
        CorpusSources {
            corpus_path,
            crawl: self.crawl,
            files: &self.files,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reads the config file, or built-in defaults when it does not exist.
fn load(path: &Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!("config {} not found, using defaults", path.display());
        Ok(config::Config::default())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    match cli.command {
        Commands::Crawl { corpus, out } => {
            let cfg = load(&cli.config)?;
            crawl_cmd::run_crawl(&cfg, corpus.as_deref(), &out)?;
        }
        Commands::Ingest { paths, corpus, out } => {
            let cfg = load(&cli.config)?;
            ingest::run_ingest(&cfg, &paths, corpus.as_deref(), &out)?;
        }
        Commands::Search {
            query,
            corpus,
            limit,
        } => {
            let cfg = load(&cli.config)?;
            search::run_search(&cfg, &query, &corpus, limit)?;
        }
        Commands::Ask { question, input: args } => {
            let cfg = load(&cli.config)?;
            chat::run_ask(&cfg, &question, &args.sources(), args.whole)?;
        }
        Commands::Chat { input: args } => {
            let cfg = load(&cli.config)?;
            chat::run_chat(&cfg, &args.sources(), args.whole)?;
        }
        Commands::Export { corpus, out } => {
            let cfg = load(&cli.config)?;
            export::run_export(&cfg, &corpus, out.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "site-chat", &mut std::io::stdout());
        }
    }

    Ok(())
}
