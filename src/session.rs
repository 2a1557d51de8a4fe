//! Conversation state and the request / tool-round loop.
//!
//! The session owns the ordered turn history and drives the model: send the
//! history, execute any tool calls the model requests, feed the results
//! back, and repeat until the model produces a final text turn.
//!
//! A turn in flight is staged on a copy of the history and only committed
//! when the exchange completes. Cancelling mid-turn (dropping the future)
//! therefore leaves the committed history untouched: it only ever contains
//! completed exchanges, which also keeps the user/assistant alternation
//! intact for the next request.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use futures::StreamExt;
use serde_json::Value;

use crate::constants::get_max_tool_rounds;
use crate::logging::{log_debug, log_info, log_warn};
use crate::message::{ChatMessage, ContentBlock, ToolCall};
use crate::prompt::SYSTEM_PROMPT;
use crate::provider::{CompletionRequest, ModelProvider, StreamEvent};
use crate::tools::{ToolExecutor, ToolSchema};

/// Progress notifications emitted while a turn runs, so the caller can
/// render output without the session knowing about terminals.
pub enum SessionEvent<'a> {
    /// A fragment of streamed assistant text.
    Fragment(&'a str),
    /// The model requested a tool invocation.
    ToolCall { name: &'a str, input: &'a Value },
    /// A tool invocation finished.
    ToolResult { name: &'a str, output: &'a str },
}

pub struct ChatSession {
    provider: Box<dyn ModelProvider>,
    executor: ToolExecutor,
    messages: Vec<ChatMessage>,
    schemas: Vec<ToolSchema>,
    max_tool_rounds: usize,
}

impl ChatSession {
    pub fn new(provider: Box<dyn ModelProvider>, executor: ToolExecutor) -> Self {
        let schemas = executor.registry().to_api_format();
        Self {
            provider,
            executor,
            messages: Vec::new(),
            schemas,
            max_tool_rounds: get_max_tool_rounds(),
        }
    }

    #[cfg(test)]
    fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Committed conversation history.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send a user message and return the final assistant text.
    pub async fn submit(&mut self, user_text: &str) -> Result<String> {
        let mut pending = self.messages.clone();
        pending.push(ChatMessage::user(user_text));

        for round in 0..self.max_tool_rounds {
            let reply = self
                .provider
                .complete(CompletionRequest {
                    system: SYSTEM_PROMPT,
                    messages: &pending,
                    tools: &self.schemas,
                })
                .await?;
            log_debug(&format!(
                "Round {round}: stop reason {:?}, {} tool call(s)",
                reply.stop_reason,
                reply.tool_calls.len()
            ));

            if reply.tool_calls.is_empty() {
                pending.push(ChatMessage::assistant(reply.text.clone()));
                self.messages = pending;
                return Ok(reply.text);
            }

            self.run_tool_round(&mut pending, reply.text, reply.tool_calls, &mut |_| {})
                .await;
        }

        Err(anyhow!(
            "tool call limit reached after {} round(s) without a final response",
            self.max_tool_rounds
        ))
    }

    /// Send a user message, forwarding text fragments and tool progress to
    /// `on_event` as they arrive. Returns the final assistant text.
    pub async fn submit_stream(
        &mut self,
        user_text: &str,
        on_event: &mut (dyn FnMut(SessionEvent<'_>) + Send),
    ) -> Result<String> {
        let mut pending = self.messages.clone();
        pending.push(ChatMessage::user(user_text));

        for round in 0..self.max_tool_rounds {
            let (text, tool_calls) = self.stream_round(&pending, on_event).await?;
            log_debug(&format!(
                "Round {round}: streamed {} char(s), {} tool call(s)",
                text.len(),
                tool_calls.len()
            ));

            if tool_calls.is_empty() {
                pending.push(ChatMessage::assistant(text.clone()));
                self.messages = pending;
                return Ok(text);
            }

            self.run_tool_round(&mut pending, text, tool_calls, on_event)
                .await;
        }

        Err(anyhow!(
            "tool call limit reached after {} round(s) without a final response",
            self.max_tool_rounds
        ))
    }

    /// Consume one streamed response: forward text deltas as they arrive
    /// and assemble tool calls from their input-JSON deltas, keyed by
    /// content-block index so they finalize in the order the model issued
    /// them.
    async fn stream_round(
        &self,
        pending: &[ChatMessage],
        on_event: &mut (dyn FnMut(SessionEvent<'_>) + Send),
    ) -> Result<(String, Vec<ToolCall>)> {
        let mut stream = self
            .provider
            .complete_stream(CompletionRequest {
                system: SYSTEM_PROMPT,
                messages: pending,
                tools: &self.schemas,
            })
            .await?;

        let mut text = String::new();
        let mut blocks: BTreeMap<usize, PendingToolUse> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta(fragment) => {
                    on_event(SessionEvent::Fragment(&fragment));
                    text.push_str(&fragment);
                }
                StreamEvent::ToolUseStart { index, id, name } => {
                    blocks.insert(
                        index,
                        PendingToolUse {
                            id,
                            name,
                            input_json: String::new(),
                        },
                    );
                }
                StreamEvent::ToolUseInputDelta {
                    index,
                    partial_json,
                } => match blocks.get_mut(&index) {
                    Some(block) => block.input_json.push_str(&partial_json),
                    None => log_warn(&format!("Input delta for unknown tool block {index}")),
                },
                StreamEvent::Done { stop_reason } => {
                    log_debug(&format!("Stream finished: {stop_reason:?}"));
                }
            }
        }

        let tool_calls = blocks.into_values().map(PendingToolUse::into_tool_call).collect();
        Ok((text, tool_calls))
    }

    /// Append the assistant tool-use turn, run the calls, and append the
    /// result turn.
    async fn run_tool_round(
        &self,
        pending: &mut Vec<ChatMessage>,
        text: String,
        tool_calls: Vec<ToolCall>,
        on_event: &mut (dyn FnMut(SessionEvent<'_>) + Send),
    ) {
        log_info(&format!(
            "Model requested {} tool call(s)",
            tool_calls.len()
        ));
        for call in &tool_calls {
            on_event(SessionEvent::ToolCall {
                name: &call.name,
                input: &call.input,
            });
        }

        pending.push(ChatMessage::tool_use(text, &tool_calls));

        let results = self.executor.execute_tool_calls(&tool_calls).await;
        for (call, result) in tool_calls.iter().zip(&results) {
            if let ContentBlock::ToolResult { content, .. } = result {
                on_event(SessionEvent::ToolResult {
                    name: &call.name,
                    output: content,
                });
            }
        }

        pending.push(ChatMessage::tool_results(results));
    }
}

struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

impl PendingToolUse {
    fn into_tool_call(self) -> ToolCall {
        let input = if self.input_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.input_json).unwrap_or_else(|e| {
                log_warn(&format!(
                    "Malformed tool input for {}: {e}, passing empty object",
                    self.name
                ));
                Value::Object(Default::default())
            })
        };
        ToolCall {
            id: self.id,
            name: self.name,
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::message::{Role, TokenUsage};
    use crate::provider::{EventStream, ModelReply, StopReason};
    use crate::tools::{EchoTool, ToolRegistry};

    struct MockProvider {
        replies: Mutex<VecDeque<ModelReply>>,
        streams: Mutex<VecDeque<Vec<StreamEvent>>>,
    }

    impl MockProvider {
        fn with_replies(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                streams: Mutex::new(VecDeque::new()),
            }
        }

        fn with_streams(streams: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                streams: Mutex::new(streams.into()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for MockProvider {
        async fn complete(&self, _request: CompletionRequest<'_>) -> Result<ModelReply> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted reply left"))
        }

        async fn complete_stream(&self, _request: CompletionRequest<'_>) -> Result<EventStream> {
            let events = self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted stream left"))?;
            let items: Vec<Result<StreamEvent>> = events.into_iter().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }

        fn provider_name(&self) -> &str {
            "Mock"
        }
    }

    fn text_reply(text: &str) -> ModelReply {
        ModelReply {
            text: text.to_string(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    fn echo_call_reply(message: &str) -> ModelReply {
        ModelReply {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "toolu_1".to_string(),
                name: "echo".to_string(),
                input: json!({ "message": message }),
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    fn session_with(provider: MockProvider) -> ChatSession {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        ChatSession::new(Box::new(provider), ToolExecutor::new(registry))
    }

    #[tokio::test]
    async fn test_submit_text_only() {
        let provider = MockProvider::with_replies(vec![text_reply("Hello there")]);
        let mut session = session_with(provider);

        let response = session.submit("Hi").await.unwrap();
        assert_eq!(response, "Hello there");

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text(), "Hi");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text(), "Hello there");
    }

    #[tokio::test]
    async fn test_submit_with_tool_round() {
        let provider =
            MockProvider::with_replies(vec![echo_call_reply("Hello!"), text_reply("done")]);
        let mut session = session_with(provider);

        let response = session.submit("use the echo tool").await.unwrap();
        assert_eq!(response, "done");

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(matches!(
            history[1].content[0],
            ContentBlock::ToolUse { .. }
        ));
        assert_eq!(history[2].role, Role::User);
        match &history[2].content[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content, "Echo: Hello!");
            }
            other => panic!("unexpected block: {other:?}"),
        }
        assert_eq!(history[3].text(), "done");
    }

    #[tokio::test]
    async fn test_submit_round_limit_discards_turn() {
        let provider = MockProvider::with_replies(vec![
            echo_call_reply("a"),
            echo_call_reply("b"),
        ]);
        let mut session = session_with(provider).with_max_tool_rounds(2);

        let err = session.submit("loop forever").await.unwrap_err();
        assert!(err.to_string().contains("tool call limit"));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_submit_provider_error_discards_turn() {
        let provider = MockProvider::with_replies(vec![]);
        let mut session = session_with(provider);

        assert!(session.submit("hi").await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_submit_stream_forwards_fragments() {
        let provider = MockProvider::with_streams(vec![vec![
            StreamEvent::TextDelta("Hel".to_string()),
            StreamEvent::TextDelta("lo".to_string()),
            StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
            },
        ]]);
        let mut session = session_with(provider);

        let mut fragments: Vec<String> = Vec::new();
        let response = session
            .submit_stream("Hi", &mut |event| {
                if let SessionEvent::Fragment(text) = event {
                    fragments.push(text.to_string());
                }
            })
            .await
            .unwrap();

        assert_eq!(fragments, vec!["Hel", "lo"]);
        assert_eq!(response, "Hello");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].text(), "Hello");
    }

    #[tokio::test]
    async fn test_submit_stream_assembles_tool_calls() {
        let provider = MockProvider::with_streams(vec![
            vec![
                StreamEvent::ToolUseStart {
                    index: 0,
                    id: "toolu_9".to_string(),
                    name: "echo".to_string(),
                },
                StreamEvent::ToolUseInputDelta {
                    index: 0,
                    partial_json: "{\"mess".to_string(),
                },
                StreamEvent::ToolUseInputDelta {
                    index: 0,
                    partial_json: "age\": \"Hi\"}".to_string(),
                },
                StreamEvent::Done {
                    stop_reason: StopReason::ToolUse,
                },
            ],
            vec![
                StreamEvent::TextDelta("ok".to_string()),
                StreamEvent::Done {
                    stop_reason: StopReason::EndTurn,
                },
            ],
        ]);
        let mut session = session_with(provider);

        let mut tool_outputs: Vec<String> = Vec::new();
        let response = session
            .submit_stream("go", &mut |event| {
                if let SessionEvent::ToolResult { output, .. } = event {
                    tool_outputs.push(output.to_string());
                }
            })
            .await
            .unwrap();

        assert_eq!(response, "ok");
        assert_eq!(tool_outputs, vec!["Echo: Hi"]);

        let history = session.history();
        assert_eq!(history.len(), 4);
        match &history[2].content[0] {
            ContentBlock::ToolResult { content, .. } => assert_eq!(content, "Echo: Hi"),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_error_discards_turn() {
        struct FailingStream;

        #[async_trait]
        impl ModelProvider for FailingStream {
            async fn complete(&self, _request: CompletionRequest<'_>) -> Result<ModelReply> {
                Err(anyhow!("unused"))
            }

            async fn complete_stream(
                &self,
                _request: CompletionRequest<'_>,
            ) -> Result<EventStream> {
                Ok(Box::pin(futures::stream::iter(vec![
                    Ok(StreamEvent::TextDelta("par".to_string())),
                    Err(anyhow!("connection reset")),
                ])))
            }

            fn model_name(&self) -> &str {
                "mock-model"
            }

            fn provider_name(&self) -> &str {
                "Mock"
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let mut session = ChatSession::new(Box::new(FailingStream), ToolExecutor::new(registry));

        let err = session.submit_stream("hi", &mut |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        // The partial assistant text is not committed.
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_pending_tool_use_empty_input() {
        let pending = PendingToolUse {
            id: "toolu_1".to_string(),
            name: "echo".to_string(),
            input_json: String::new(),
        };
        let call = pending.into_tool_call();
        assert_eq!(call.input, json!({}));
    }
}
