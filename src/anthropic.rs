//! Anthropic Messages API client.
//!
//! Speaks the native Messages protocol: system prompt as a separate field,
//! content-block messages, tool advertisement via `input_schema`, and SSE
//! streaming with `content_block_*` / `message_*` events.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{ANTHROPIC_API_URL, ANTHROPIC_VERSION};
use crate::logging::{log_debug, log_info, log_trace, log_warn};
use crate::message::{ChatMessage, ContentBlock, TokenUsage, ToolCall};
use crate::provider::{
    CompletionRequest, EventStream, ModelProvider, ModelReply, StopReason, StreamEvent,
};
use crate::sse::create_sse_stream;
use crate::tools::ToolSchema;

const MAX_RETRIES: u32 = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the Anthropic client.
#[derive(Debug)]
struct AnthropicConfig {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

/// Client for the Anthropic Messages API.
///
/// Configuration lives behind an `Arc`, making the client cheap to clone.
#[derive(Clone)]
pub struct AnthropicClient {
    config: Arc<AnthropicConfig>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str_is_empty")]
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "slice_is_empty")]
    tools: &'a [ToolSchema],
    #[serde(skip_serializing_if = "is_false")]
    stream: bool,
}

fn str_is_empty(value: &&str) -> bool {
    value.is_empty()
}

fn slice_is_empty(value: &&[ToolSchema]) -> bool {
    value.is_empty()
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let config = AnthropicConfig {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            base_url: ANTHROPIC_API_URL.to_string(),
        };
        log_info(&format!(
            "Initializing Anthropic API client with model: {}",
            config.model
        ));

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    fn build_body<'a>(&'a self, request: &CompletionRequest<'a>, stream: bool) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: request.system,
            messages: request.messages,
            tools: request.tools,
            stream,
        }
    }

    /// Send the request, retrying on rate limits, overload, server errors,
    /// and transport failures. Client errors (4xx) fail immediately with
    /// the server's message.
    async fn send(&self, body: &MessagesRequest<'_>, streaming: bool) -> Result<reqwest::Response> {
        let endpoint = format!("{}/v1/messages", self.config.base_url);
        let mut retry_delay = Duration::from_secs(1);
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                log_warn(&format!(
                    "Retrying Anthropic request (attempt {attempt}) after {retry_delay:?}"
                ));
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let mut request = self
                .client
                .post(&endpoint)
                .header("content-type", "application/json")
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body);
            // A whole-request timeout would cut long streams short.
            if !streaming {
                request = request.timeout(REQUEST_TIMEOUT);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    log_debug(&format!("Transport error: {e}"));
                    last_error = Some(anyhow::Error::new(e).context("Failed to send request"));
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    retry_delay = Duration::from_secs(retry_after);
                }
                last_error = Some(anyhow!("Rate limited by the Anthropic API (429)"));
                continue;
            }
            if status.as_u16() == 529 {
                last_error = Some(anyhow!("Anthropic API overloaded (529)"));
                continue;
            }
            if status.is_server_error() {
                last_error = Some(anyhow!("Anthropic API server error: {status}"));
                continue;
            }
            if status.is_client_error() {
                let text = response.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "Anthropic API error ({status}): {}",
                    api_error_message(&text)
                ));
            }

            return Ok(response);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Anthropic request failed after {} attempts", MAX_RETRIES + 1)))
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply> {
        log_debug(&format!(
            "Sending chat request with {} message(s), {} tool(s)",
            request.messages.len(),
            request.tools.len()
        ));

        let body = self.build_body(&request, false);
        let response = self.send(&body, false).await?;
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        log_trace(&format!("Raw response: {text}"));

        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse response: {}", truncate(&text, 500)))?;
        if value.get("type").and_then(|t| t.as_str()) == Some("error") {
            return Err(anyhow!("Anthropic API error: {}", api_error_message(&text)));
        }

        let parsed: MessagesResponse =
            serde_json::from_value(value).context("Unexpected response shape")?;
        let usage = parsed.usage.unwrap_or_default();
        log_debug(&format!("Token usage: {}", usage.format_short()));

        Ok(parse_reply(parsed))
    }

    async fn complete_stream(&self, request: CompletionRequest<'_>) -> Result<EventStream> {
        log_debug(&format!(
            "Sending streaming chat request with {} message(s), {} tool(s)",
            request.messages.len(),
            request.tools.len()
        ));

        let body = self.build_body(&request, true);
        let response = self.send(&body, true).await?;
        Ok(create_sse_stream(response, parse_stream_event))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }
}

fn parse_reply(response: MessagesResponse) -> ModelReply {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, input });
            }
            other => log_debug(&format!("Skipping content block: {other:?}")),
        }
    }

    let stop_reason = response
        .stop_reason
        .as_deref()
        .map(StopReason::from_api)
        .unwrap_or(StopReason::EndTurn);

    ModelReply {
        text: text_parts.join(""),
        tool_calls,
        stop_reason,
        usage: response.usage.unwrap_or_default(),
    }
}

// ============================================================================
// SSE event parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    MessageStart {},
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {},
    MessageDelta {
        #[serde(default)]
        delta: Option<MessageDeltaInfo>,
        #[serde(default)]
        usage: Option<TokenUsage>,
    },
    MessageStop {},
    Ping {},
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Parse one SSE event into at most one `StreamEvent`.
fn parse_stream_event(event: &str) -> Result<Option<StreamEvent>> {
    let data: String = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return Ok(None);
    }

    let payload: StreamPayload = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse stream event: {}", truncate(&data, 200)))?;

    let event = match payload {
        StreamPayload::ContentBlockStart {
            index,
            content_block: ContentBlock::ToolUse { id, name, .. },
        } => Some(StreamEvent::ToolUseStart { index, id, name }),
        StreamPayload::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
            ..
        } => Some(StreamEvent::TextDelta(text)),
        StreamPayload::ContentBlockDelta {
            index,
            delta: BlockDelta::InputJsonDelta { partial_json },
        } => Some(StreamEvent::ToolUseInputDelta {
            index,
            partial_json,
        }),
        StreamPayload::MessageDelta { delta, usage } => {
            if let Some(usage) = usage {
                log_debug(&format!("Token usage: {}", usage.format_short()));
            }
            delta
                .and_then(|d| d.stop_reason)
                .map(|reason| StreamEvent::Done {
                    stop_reason: StopReason::from_api(&reason),
                })
        }
        StreamPayload::Error { error } => {
            return Err(anyhow!("Anthropic API stream error: {}", error.message));
        }
        _ => None,
    };
    Ok(event)
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            let message = value.get("error")?.get("message")?.as_str()?;
            Some(message.to_string())
        })
        .unwrap_or_else(|| truncate(body, 500))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
