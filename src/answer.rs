//! Answer requester: one prompt in, one completion out.
//!
//! [`ask`] packages a question and its context into a chat-completion
//! request and returns an [`Answer`]. Remote failures never propagate as
//! errors: they become [`Answer::Unavailable`], which displays as
//! [`FAILURE_MESSAGE`]. Nothing is retried.
//!
//! The HTTP client needs an [`ApiKey`], and the only way to get one is
//! [`ApiKey::from_env`], so a missing credential is caught before any
//! prompt is built.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

/// Shown to the user whenever the completion service cannot answer.
pub const FAILURE_MESSAGE: &str =
    "Sorry, the answer service is unavailable right now. Please try asking again.";

const SYSTEM_PROMPT: &str = "You answer questions using only the provided context. \
Quote or paraphrase the context, name the source you used, and if the context does not \
contain the answer, say that you could not find it.";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("environment variable {0} is not set; export it or add it to .env")]
    MissingApiKey(String),
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response had no choices")]
    EmptyResponse,
}

/// Credential for the completion service.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Reads the key from `var`; blank values count as missing.
    pub fn from_env(var: &str) -> Result<Self, AnswerError> {
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => Ok(Self(v.trim().to_string())),
            _ => Err(AnswerError::MissingApiKey(var.to_string())),
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// A chat-completion backend.
pub trait ChatCompletion {
    fn complete(&self, request: &ChatRequest) -> Result<String, AnswerError>;
}

/// OpenAI-compatible `POST {base_url}/chat/completions` client.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: ApiKey) -> Result<Self, AnswerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl ChatCompletion for OpenAiClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, AnswerError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.expose());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| AnswerError::InvalidApiKey(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(headers)
            .json(request)
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AnswerError::Status { status, body });
        }
        let parsed: ChatResponse = resp.json()?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or(AnswerError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Completed(String),
    Unavailable { reason: String },
}

impl Answer {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Answer::Completed(text) => text,
            Answer::Unavailable { .. } => FAILURE_MESSAGE,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Answer::Completed(_))
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Builds the two-message prompt: instructions, then context and question.
pub fn build_request(question: &str, context: &str, model: &str, temperature: f32) -> ChatRequest {
    let user = format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer based only on the context above.",
        context, question
    );
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::new("system", SYSTEM_PROMPT),
            ChatMessage::new("user", user),
        ],
        temperature,
    }
}

/// Asks `question` against `context` and returns the completion unmodified.
pub fn ask(
    client: &dyn ChatCompletion,
    question: &str,
    context: &str,
    model: &str,
    temperature: f32,
) -> Answer {
    let request = build_request(question, context, model, temperature);
    match client.complete(&request) {
        Ok(text) => Answer::Completed(text),
        Err(e) => {
            tracing::debug!(error = %e, model, "completion failed");
            Answer::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
