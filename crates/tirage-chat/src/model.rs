//! Client for the external generative service.
//!
//! [`GenerativeModel`] is the seam the pipeline talks to; [`HttpModel`]
//! implements it against an OpenAI-compatible `/chat/completions` endpoint.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tirage_core::config::LlmConfig;

use crate::error::ChatError;
use crate::types::ConversationMessage;

/// Text deltas in generation order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Longest upstream error body kept in [`ChatError::Upstream`].
const MAX_ERROR_BODY: usize = 300;

/// One call to the generative service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ConversationMessage>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// External generative service.
///
/// Implementations report transport failures as [`ChatError::Network`] or
/// [`ChatError::Timeout`] and non-success statuses as
/// [`ChatError::Upstream`], so the breaker can tell them apart.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Full reply in one piece.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError>;

    /// Reply as a stream of text deltas. The outer result covers
    /// establishing the stream; errors after that arrive as items.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ChatError>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// OpenAI-compatible chat completions client.
pub struct HttpModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpModel {
    /// Build a client from configuration.
    ///
    /// Returns `None` when no credential is configured.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create HTTP client, using default config: {}", e);
                reqwest::Client::new()
            });
        Some(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    fn body(&self, request: &GenerationRequest, stream: bool) -> Value {
        request_body(&self.model, request, stream)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            text.truncate(cut);
        }
        warn!(status = status.as_u16(), "Generative service returned an error");
        Err(ChatError::Upstream {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl GenerativeModel for HttpModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
        let response = self.send(&self.body(request, false)).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Malformed(e.to_string()))?;
        let text = completion_text(&payload)?;
        debug!(chars = text.len(), "Generation complete");
        Ok(text)
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ChatError> {
        let response = self.send(&self.body(request, true)).await?;
        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                future::ready(!matches!(event, Ok(e) if e.data.trim() == "[DONE]"))
            })
            .filter_map(|event| {
                future::ready(match event {
                    Ok(e) => delta_text(&e.data).transpose(),
                    Err(e) => Some(Err(ChatError::Network(format!("SSE stream error: {}", e)))),
                })
            });
        Ok(Box::pin(stream))
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Network(e.to_string())
    }
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

fn request_body(model: &str, request: &GenerationRequest, stream: bool) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(json!({ "role": "system", "content": request.system }));
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.text })),
    );
    json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_output_tokens,
        "stream": stream,
    })
}

/// Text of a non-streamed completion.
fn completion_text(payload: &Value) -> Result<String, ChatError> {
    if let Some(message) = api_error(payload) {
        return Err(ChatError::Malformed(message));
    }
    let content = payload
        .pointer("/choices/0/message/content")
        .ok_or_else(|| ChatError::Malformed("missing choices[0].message.content".to_string()))?;
    let text = content.as_str().unwrap_or_default().trim();
    if text.is_empty() {
        return Err(ChatError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Text delta of one SSE event, `None` for keepalive or metadata events.
fn delta_text(data: &str) -> Result<Option<String>, ChatError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    let event: Value = serde_json::from_str(data)
        .map_err(|e| ChatError::Malformed(format!("SSE parsing error: {}", e)))?;
    if let Some(message) = api_error(&event) {
        return Err(ChatError::Malformed(message));
    }
    Ok(event
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

fn api_error(payload: &Value) -> Option<String> {
    let error = payload.get("error")?;
    Some(
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("unknown API error")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "Be brief.".to_string(),
            messages: vec![
                ConversationMessage::user("hello"),
                ConversationMessage::assistant("hi"),
                ConversationMessage::user("what is the next draw?"),
            ],
            temperature: 0.3,
            max_output_tokens: 200,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("gpt-test", &request(), true);
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 200);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "what is the next draw?");
    }

    #[test]
    fn test_request_body_without_system() {
        let mut req = request();
        req.system.clear();
        let body = request_body("m", &req, false);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_completion_text() {
        let payload = json!({ "choices": [{ "message": { "content": "  Hello there. " } }] });
        assert_eq!(completion_text(&payload).unwrap(), "Hello there.");
    }

    #[test]
    fn test_completion_text_errors() {
        let empty = json!({ "choices": [{ "message": { "content": "  " } }] });
        assert_eq!(completion_text(&empty), Err(ChatError::EmptyResponse));

        let missing = json!({ "choices": [] });
        assert!(matches!(completion_text(&missing), Err(ChatError::Malformed(_))));

        let api = json!({ "error": { "message": "quota" } });
        assert_eq!(
            completion_text(&api),
            Err(ChatError::Malformed("quota".to_string()))
        );
    }

    #[test]
    fn test_delta_text() {
        let chunk = r#"{"object":"chat.completion.chunk","choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_text(chunk).unwrap().as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_text(role_only).unwrap(), None);

        assert!(delta_text("not json").is_err());
        assert_eq!(delta_text("").unwrap(), None);
    }

    #[test]
    fn test_from_config_requires_credential() {
        let mut config = LlmConfig::default();
        assert!(HttpModel::from_config(&config).is_none());
        config.api_key = Some("  ".to_string());
        assert!(HttpModel::from_config(&config).is_none());
        config.api_key = Some("sk-test".to_string());
        assert!(HttpModel::from_config(&config).is_some());
    }
}
