use crate::logging::{log_debug, log_info};
use crate::message::{ContentBlock, ToolCall};

use super::registry::ToolRegistry;

/// Orchestrates execution of the tool calls from one model turn.
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Execute a single tool call and wrap the result for the next request.
    pub async fn execute_tool_call(&self, call: &ToolCall) -> ContentBlock {
        log_info(&format!("Executing tool: {} (id: {})", call.name, call.id));
        log_debug(&format!("Tool arguments: {}", call.input));

        let result = self.registry.execute(&call.name, call.input.clone()).await;

        log_info(&format!(
            "Tool {} finished, output length: {}",
            call.name,
            result.len()
        ));

        ContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: result,
        }
    }

    /// Execute a batch of tool calls concurrently.
    ///
    /// `join_all` preserves input order, so results come back in the order
    /// the model requested the calls.
    pub async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Vec<ContentBlock> {
        log_info(&format!("Executing {} tool call(s)", calls.len()));

        let futures: Vec<_> = calls.iter().map(|call| self.execute_tool_call(call)).collect();
        futures::future::join_all(futures).await
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}
