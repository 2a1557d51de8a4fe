use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::logging::{log_debug, log_error};

/// Trait implemented by every tool the model can invoke.
///
/// Expected failures (missing files, denied paths, and the like) are part
/// of a tool's normal output and come back as `Ok` strings; only genuinely
/// unexpected faults are `Err`, and the registry normalizes those so a
/// misbehaving tool can never take the conversation down with it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (e.g. "read_file"). Unique, and the sole lookup key.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn schema(&self) -> Value;

    /// Execute the tool with the given JSON arguments.
    async fn execute(&self, args: Value) -> Result<String>;

    /// Convert to the API tool-advertisement shape.
    fn to_api_format(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.schema(),
        }
    }
}

/// Tool definition in the shape the Messages API expects. The parameter
/// schema passes through verbatim as `input_schema`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Registry of available tools.
///
/// Backed by a Vec so schema export order is registration order, which
/// keeps the advertised tool list deterministic across runs.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A name collision replaces the existing entry in
    /// place, keeping its export-order slot.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            log_debug(&format!(
                "Tool '{}' registered twice, replacing previous entry",
                tool.name()
            ));
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Convert all registered tools to the API format, in registration
    /// order.
    pub fn to_api_format(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.to_api_format()).collect()
    }

    /// Dispatch an invocation by name.
    ///
    /// Always produces a string: an unknown name or a failing tool becomes
    /// an error message flowing back into the conversation, never an error
    /// crossing this boundary.
    pub async fn execute(&self, name: &str, args: Value) -> String {
        match self.get(name) {
            None => {
                log_error(&format!("Unknown tool requested: {name}"));
                format!("unknown capability '{name}'")
            }
            Some(tool) => match tool.execute(args).await {
                Ok(output) => output,
                Err(e) => {
                    log_error(&format!("Tool {name} failed: {e:#}"));
                    format!("error executing {name}: {e:#}")
                }
            },
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
