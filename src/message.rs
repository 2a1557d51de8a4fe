use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a participant in a conversation.
///
/// The Messages API only carries `user` and `assistant` roles; the system
/// prompt travels as a separate request field and tool results are sent as
/// user turns containing `tool_result` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block of a message, in the shape the Messages API uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not handle (e.g. thinking). Parsed and
    /// skipped rather than failing the whole response.
    #[serde(other)]
    Unknown,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// Plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Plain-text assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Assistant turn carrying tool invocations, with any text the model
    /// produced before the calls kept in front of the `tool_use` blocks.
    pub fn tool_use(text: String, calls: &[ToolCall]) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
        for call in calls {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// User turn carrying tool results back to the model.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    #[cfg(test)]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Token counts reported by the API. Logged for diagnostics only.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn format_short(&self) -> String {
        match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => format!("{}+{}={}", input, output, input + output),
            (Some(input), None) => format!("{}+?", input),
            (None, Some(output)) => format!("?+{}", output),
            (None, None) => "N/A".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_serialization() {
        let message = ChatMessage::user("Hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_tool_use_message_serialization() {
        let calls = vec![ToolCall {
            id: "toolu_1".to_string(),
            name: "read_file".to_string(),
            input: json!({"path": "main.rs"}),
        }];
        let message = ChatMessage::tool_use("Let me check.".to_string(), &calls);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "tool_use");
        assert_eq!(value["content"][1]["id"], "toolu_1");
        assert_eq!(value["content"][1]["input"]["path"], "main.rs");
    }

    #[test]
    fn test_tool_use_without_text_has_no_text_block() {
        let calls = vec![ToolCall {
            id: "toolu_2".to_string(),
            name: "echo".to_string(),
            input: json!({"message": "hi"}),
        }];
        let message = ChatMessage::tool_use(String::new(), &calls);
        assert_eq!(message.content.len(), 1);
        assert!(matches!(message.content[0], ContentBlock::ToolUse { .. }));
    }

    #[test]
    fn test_tool_result_serialization() {
        let message = ChatMessage::tool_results(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "Echo: hi".to_string(),
        }]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "tool_result");
        assert_eq!(value["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(value["content"][0]["content"], "Echo: hi");
    }

    #[test]
    fn test_unknown_block_type_deserializes() {
        let value = json!({"type": "thinking", "thinking": "hmm"});
        let block: ContentBlock = serde_json::from_value(value).unwrap();
        assert!(matches!(block, ContentBlock::Unknown));
    }

    #[test]
    fn test_token_usage_format_short() {
        let usage = TokenUsage {
            input_tokens: Some(10),
            output_tokens: Some(5),
        };
        assert_eq!(usage.format_short(), "10+5=15");
        assert_eq!(TokenUsage::default().format_short(), "N/A");
    }
}
