use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::Stream;

use crate::message::{ChatMessage, TokenUsage, ToolCall};
use crate::tools::ToolSchema;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other,
}

impl StopReason {
    pub(crate) fn from_api(value: &str) -> Self {
        match value {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            _ => Self::Other,
        }
    }
}

/// A complete model response: the text it produced and any tool
/// invocations it requested, in request order.
#[derive(Debug)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// One event of a streaming response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental assistant text.
    TextDelta(String),
    /// A tool-use content block opened at `index`.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },
    /// Partial JSON for the input of the tool-use block at `index`.
    ToolUseInputDelta { index: usize, partial_json: String },
    /// The response finished.
    Done { stop_reason: StopReason },
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// One completion request: the full ordered turn history plus the
/// advertised tool schemas and the system prompt.
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSchema],
}

/// Generic model backend trait, the seam between the session and the
/// provider actually doing the network round-trip.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Request a complete response.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply>;

    /// Request a streaming response.
    async fn complete_stream(&self, request: CompletionRequest<'_>) -> Result<EventStream>;

    /// Model identifier in use.
    fn model_name(&self) -> &str;

    /// Provider name (e.g. "Anthropic").
    fn provider_name(&self) -> &str;
}

/// Configuration for creating a provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
}

/// Factory for creating model providers.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_provider(settings: ProviderSettings) -> Result<Box<dyn ModelProvider>> {
        let client = crate::anthropic::AnthropicClient::new(
            settings.api_key,
            settings.model,
            settings.max_tokens,
        )?;
        // Future providers can be added here behind a model-string prefix.
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_from_api() {
        assert_eq!(StopReason::from_api("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_api("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_api("max_tokens"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::from_api("stop_sequence"),
            StopReason::StopSequence
        );
        assert_eq!(StopReason::from_api("whatever"), StopReason::Other);
    }

    #[test]
    fn test_create_provider() {
        let settings = ProviderSettings {
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_key: "sk-ant-test".to_string(),
            max_tokens: 1024,
        };
        let provider = ProviderFactory::create_provider(settings).unwrap();
        assert_eq!(provider.provider_name(), "Anthropic");
        assert_eq!(provider.model_name(), "claude-sonnet-4-5-20250929");
    }
}
