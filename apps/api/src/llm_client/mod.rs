//! Model-provider client for the interview pipeline.
//!
//! Only this module talks to the Anthropic Messages API. Feature code reaches
//! it through the traits in `crate::ai`, so every call site can fall back to
//! templates when the backend is absent.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ai::{Classification, SentimentLabel, SentimentModel, TextGenerator, TopicClassifier};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
/// Classifier and sentiment replies are tiny JSON objects.
const JSON_MAX_TOKENS: u32 = 256;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Callers wrap every call in their own (shorter) timeout; this only bounds a
/// hung connection.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<LlmError> },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesReply {
    /// Concatenated text blocks, trimmed. `None` when nothing is left.
    fn into_text(self) -> Option<String> {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            api_key,
        })
    }

    /// Sends one user turn and returns the reply text, retrying transient
    /// failures with exponential backoff (500ms, 1s).
    pub async fn complete(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let body = json!({
            "model": MODEL,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut attempt = 1;
        loop {
            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    warn!("Model call attempt {attempt} failed ({err}); retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(LlmError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    })
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let reply: MessagesReply = response.json().await?;
        let text = reply.into_text().ok_or(LlmError::EmptyContent)?;
        debug!("Model call returned {} chars", text.len());
        Ok(text)
    }

    /// Completes at temperature 0 and parses the reply as JSON.
    pub async fn complete_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LlmError> {
        let text = self
            .complete(prompt, prompts::JSON_ONLY_SYSTEM, JSON_MAX_TOKENS, 0.0)
            .await?;
        Ok(serde_json::from_str(strip_json_fences(&text))?)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.complete(prompt, prompts::COMPLETION_SYSTEM, max_tokens, temperature)
            .await
    }

    fn model_name(&self) -> &str {
        MODEL
    }
}

#[async_trait]
impl TopicClassifier for LlmClient {
    async fn classify(&self, text: &str, labels: &[&str]) -> Result<Classification, LlmError> {
        let labels_json = serde_json::to_string(labels)?;
        let prompt = prompts::fill(
            prompts::CLASSIFY_PROMPT_TEMPLATE,
            &[("labels_json", labels_json.as_str()), ("text", text)],
        );
        let mut result: Classification = self.complete_json(&prompt).await?;
        // Labels and scores must stay index-aligned; drop any unpaired tail.
        let paired = result.labels.len().min(result.scores.len());
        result.labels.truncate(paired);
        result.scores.truncate(paired);
        Ok(result)
    }
}

#[async_trait]
impl SentimentModel for LlmClient {
    async fn sentiment(&self, text: &str) -> Result<SentimentLabel, LlmError> {
        let prompt = prompts::fill(prompts::SENTIMENT_PROMPT_TEMPLATE, &[("text", text)]);
        self.complete_json(&prompt).await
    }
}

/// Drops a surrounding markdown fence (with or without a `json` tag).
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(inner) => {
            let inner = inner.strip_prefix("json").unwrap_or(inner);
            inner.strip_suffix("```").unwrap_or(inner).trim()
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> LlmError {
        LlmError::Api {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_strip_json_fences() {
        let bare = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences("```json\n{\"key\": \"value\"}\n```"), bare);
        assert_eq!(strip_json_fences("```\n{\"key\": \"value\"}\n```"), bare);
        assert_eq!(strip_json_fences(bare), bare);
        assert_eq!(strip_json_fences("```json\n{\"key\": \"value\"}"), bare);
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(api(429).is_retryable());
        assert!(api(503).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(401).is_retryable());
        assert!(!LlmError::EmptyContent.is_retryable());
    }

    #[test]
    fn test_reply_text_joins_text_blocks() {
        let reply: MessagesReply = serde_json::from_str(
            r#"{"content": [
                {"type": "text", "text": "  Happy to help"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": " with Django. "}
            ]}"#,
        )
        .unwrap();
        assert_eq!(reply.into_text().as_deref(), Some("Happy to help with Django."));
    }

    #[test]
    fn test_blank_reply_has_no_text() {
        let reply: MessagesReply =
            serde_json::from_str(r#"{"content": [{"type": "text", "text": "   "}]}"#).unwrap();
        assert!(reply.into_text().is_none());
    }

    #[test]
    fn test_classification_payload_deserializes() {
        let json = r#"{"labels": ["backend", "testing"], "scores": [0.82, 0.12]}"#;
        let parsed: Classification = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.labels_above(0.3), vec!["backend"]);
    }

    #[test]
    fn test_sentiment_payload_deserializes() {
        let json = r#"{"label": "NEGATIVE", "score": 0.7}"#;
        let parsed: SentimentLabel = serde_json::from_str(json).unwrap();
        assert!(parsed.signed() < 0.0);
    }
}
