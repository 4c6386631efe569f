//! Structured-generation client: constrained extraction over chat completions.
//!
//! The [`StructuredClient`] trait is the seam between the extractor and the
//! language model. The shipped implementation,
//! [`OpenAiStructuredClient`], posts to any OpenAI-compatible
//! chat-completions endpoint with a `json_schema` response format built
//! from the [`Schema`] descriptor, so the model is constrained to the
//! schema shape before our own validation even runs.
//!
//! ## Retry strategy
//!
//! One extraction call owns a small bounded retry budget covering both
//! transport failures and non-conformant responses. Backoff is
//! exponential (`retry_backoff_ms * 2^(attempt-1)`). A validation failure
//! is fed back to the model as an extra user message on the next attempt,
//! which in practice fixes most malformed responses on the first retry.
//! There is no retry above this layer — the batch driver records failures
//! and moves on.

use crate::config::ExtractConfig;
use crate::error::SiftError;
use crate::evidence::ExtractionRecord;
use crate::schema::Schema;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One chat-style message in an extraction request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A client that produces schema-conformant extraction records.
#[async_trait]
pub trait StructuredClient: Send + Sync {
    /// Run one extraction: generate, parse, validate, retry within
    /// `max_retries`, and return a record conforming to `schema`.
    async fn extract(
        &self,
        schema: &Schema,
        messages: &[ChatMessage],
        max_retries: u32,
    ) -> Result<ExtractionRecord, SiftError>;
}

/// [`StructuredClient`] over an OpenAI-compatible chat-completions API.
pub struct OpenAiStructuredClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiStructuredClient {
    /// Build a client from an [`ExtractConfig`].
    ///
    /// The API key comes from the config, falling back to `OPENAI_API_KEY`.
    pub fn from_config(config: &ExtractConfig) -> Result<Self, SiftError> {
        let api_key = match &config.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => std::env::var("OPENAI_API_KEY").map_err(|_| SiftError::BackendUnavailable {
                backend: "llm".into(),
                hint: "No API key configured. Set OPENAI_API_KEY or pass one via \
                       ExtractConfig::builder().api_key(..)."
                    .into(),
            })?,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| SiftError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    fn request_body(&self, schema: &Schema, messages: &[Value]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name(),
                    "strict": true,
                    "schema": schema.to_json_schema(),
                },
            },
        })
    }

    /// Delay before retry `attempt` (1-based). The exponent is capped so a
    /// large retry budget cannot overflow the multiplier.
    fn backoff_delay(&self, attempt: u32) -> u64 {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        self.retry_backoff_ms.saturating_mul(factor)
    }

    async fn complete(&self, body: &Value) -> Result<String, SiftError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| SiftError::ApiError {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SiftError::ApiError {
                message: format!("HTTP {status}: {}", detail.trim()),
            });
        }

        let completion: CompletionResponse =
            response.json().await.map_err(|e| SiftError::ApiError {
                message: format!("unreadable completion response: {e}"),
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SiftError::ApiError {
                message: "completion response carried no content".into(),
            })
    }
}

#[async_trait]
impl StructuredClient for OpenAiStructuredClient {
    async fn extract(
        &self,
        schema: &Schema,
        messages: &[ChatMessage],
        max_retries: u32,
    ) -> Result<ExtractionRecord, SiftError> {
        let mut wire: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut last_err: Option<SiftError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = self.backoff_delay(attempt);
                warn!(
                    "extraction '{}': retry {}/{} after {}ms",
                    schema.name(),
                    attempt,
                    max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let body = self.request_body(schema, &wire);
            let content = match self.complete(&body).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("extraction '{}': attempt {} failed — {}", schema.name(), attempt + 1, e);
                    last_err = Some(e);
                    continue;
                }
            };

            let parsed: Value = match serde_json::from_str(&content) {
                Ok(v) => v,
                Err(e) => {
                    let err = SiftError::InvalidSchema(format!("response is not JSON: {e}"));
                    wire.push(correction_message(&err));
                    warn!("extraction '{}': non-JSON response — {}", schema.name(), e);
                    last_err = Some(err);
                    continue;
                }
            };

            match schema.parse_record(&parsed) {
                Ok(record) => {
                    debug!(
                        "extraction '{}': {}/{} fields found on attempt {}",
                        schema.name(),
                        record.found_count(),
                        schema.fields().len(),
                        attempt + 1
                    );
                    return Ok(record);
                }
                Err(e) => {
                    // Feed the violation back so the next attempt can fix it.
                    wire.push(correction_message(&e));
                    warn!("extraction '{}': non-conformant response — {}", schema.name(), e);
                    last_err = Some(e);
                }
            }
        }

        Err(SiftError::RetriesExhausted {
            attempts: max_retries + 1,
            last_error: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

fn correction_message(err: &SiftError) -> Value {
    json!({
        "role": "user",
        "content": format!(
            "Your previous response was invalid: {err}. \
             Respond again with a corrected JSON object that satisfies the schema."
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_roles() {
        assert_eq!(ChatMessage::system("s").role.as_str(), "system");
        assert_eq!(ChatMessage::user("u").role.as_str(), "user");
    }

    #[test]
    fn correction_message_carries_error_text() {
        let err = SiftError::InvalidSchema("field 'x': missing evidence".into());
        let msg = correction_message(&err);
        assert_eq!(msg["role"], "user");
        assert!(msg["content"]
            .as_str()
            .unwrap()
            .contains("missing evidence"));
    }

    fn client_with_backoff(retry_backoff_ms: u64) -> OpenAiStructuredClient {
        OpenAiStructuredClient {
            http: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "k".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            max_tokens: 1024,
            retry_backoff_ms,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let client = client_with_backoff(500);
        assert_eq!(client.backoff_delay(1), 500);
        assert_eq!(client.backoff_delay(2), 1_000);
        assert_eq!(client.backoff_delay(3), 2_000);
    }

    #[test]
    fn backoff_is_capped_for_large_retry_budgets() {
        let client = client_with_backoff(500);
        let ceiling = client.backoff_delay(11);
        assert_eq!(ceiling, 500 * 1024);
        // No overflow past the cap, even at absurd attempt counts.
        assert_eq!(client.backoff_delay(64), ceiling);
        assert_eq!(client.backoff_delay(u32::MAX), ceiling);
        assert_eq!(client_with_backoff(u64::MAX).backoff_delay(5), u64::MAX);
    }

    #[test]
    fn request_body_shape() {
        let client = OpenAiStructuredClient {
            http: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "k".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            max_tokens: 1024,
            retry_backoff_ms: 1,
        };
        let schema = Schema::builder("t").text("title", "d").build().unwrap();
        let body = client.request_body(&schema, &[json!({"role": "user", "content": "x"})]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "t");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }
}
