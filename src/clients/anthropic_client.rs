// Anthropic Messages API client, streaming only.
use actix_web::web;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::pin::Pin;
use tracing::debug;

use super::cache_policy::{trailing_prefix_policy, CacheControl, CachePolicy};
use crate::config::settings::AppSettings;
use crate::error::AppError;
use crate::models::chat::ChatRequest;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

// Outbound request structs for the /messages endpoint.

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub stream: bool,
    pub system: Option<Vec<ContentBlock>>,
    pub messages: Vec<OutboundMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
    pub cache_control: Option<CacheControl>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>, cache_control: Option<CacheControl>) -> Self {
        ContentBlock {
            block_type: "text".to_string(),
            text: text.into(),
            cache_control,
        }
    }
}

pub type UpstreamByteStream =
    Pin<Box<dyn Stream<Item = Result<web::Bytes, AppError>> + Send + 'static>>;

/// Long-lived upstream client. Constructed once at startup and injected
/// into handlers via `web::Data`, so the relay stays testable against a
/// mock server through `with_base_url`.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    cache_policy: CachePolicy,
}

impl AnthropicClient {
    pub fn new(settings: &AppSettings) -> Result<Self, AppError> {
        if settings.anthropic.api_key.is_empty() {
            return Err(AppError::Configuration(
                "Anthropic API key must be configured".to_string(),
            ));
        }

        Ok(AnthropicClient {
            client: crate::utils::http_client::new_api_client(),
            api_key: settings.anthropic.api_key.clone(),
            base_url: settings.anthropic.base_url.clone(),
            cache_policy: trailing_prefix_policy,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    /// Builds the outbound request body. The system prompt becomes a single
    /// cached content block; each transcript message becomes a single text
    /// block whose cache directive comes from the configured policy.
    pub fn build_messages_request(&self, request: &ChatRequest) -> MessagesRequest {
        let system = if request.system.is_empty() {
            None
        } else {
            Some(vec![ContentBlock::text(
                &request.system,
                Some(CacheControl::ephemeral()),
            )])
        };

        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(index, message)| OutboundMessage {
                role: message.role.to_string(),
                content: vec![ContentBlock::text(
                    &message.content,
                    (self.cache_policy)(&request.messages, index),
                )],
            })
            .collect();

        MessagesRequest {
            model: request.model.clone(),
            max_tokens: MAX_TOKENS,
            stream: true,
            system,
            messages,
        }
    }

    /// Opens one streaming completion call and returns the raw SSE byte
    /// stream. Dropping the returned stream aborts the upstream request.
    pub async fn stream_messages(&self, request: &ChatRequest) -> Result<UpstreamByteStream, AppError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_messages_request(request);

        debug!(model = %body.model, messages = body.messages.len(), "opening upstream stream");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            // Upstream errors often arrive as JSON; surface just the message
            // when one is present.
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or(error_text);
            return Err(AppError::External(format!(
                "Anthropic request failed with status {}: {}",
                status, message
            )));
        }

        let stream = response.bytes_stream().map(|result| match result {
            Ok(bytes) => Ok(web::Bytes::from(bytes)),
            Err(e) => Err(AppError::External(format!("Anthropic network error: {}", e))),
        });

        Ok(Box::pin(stream))
    }
}
