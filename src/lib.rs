//! # site-chat
//!
//! Crawl a documentation subsite, normalize uploaded documents, and ask a
//! hosted language model questions about the resulting text corpus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐
//! │   Crawler   │   │ Normalizer  │
//! │ site → text │   │ xlsx/pdf/.. │
//! └──────┬──────┘   └──────┬──────┘
//!        └────────┬────────┘
//!                 ▼
//!          ┌─────────────┐      ┌──────────────┐
//!          │   Corpus    │─────▶│   Answer     │
//!          │ search/ctx  │      │  requester   │
//!          └─────────────┘      └──────────────┘
//! ```
//!
//! All of it runs inside a [`session::Session`], one pipeline step at a
//! time, with no background work.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Corpus entries and uploads |
//! | [`crawl`] | Frontier-driven site crawler |
//! | [`html`] | Content-region text and link extraction |
//! | [`normalize`] | Upload → plain text |
//! | [`corpus`] | Substring search, context packaging, JSON export |
//! | [`answer`] | Chat-completion client and prompt |
//! | [`session`] | Per-user corpus and chat history |
//! | [`ingest`] | Files and directories → uploads |

pub mod answer;
pub mod chat;
pub mod config;
pub mod corpus;
pub mod crawl;
pub mod crawl_cmd;
pub mod export;
pub mod html;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod search;
pub mod session;
