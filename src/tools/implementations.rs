/// Tool implementations
///
/// All tools follow the same pattern:
/// 1. Parse arguments from JSON
/// 2. Validate (path confinement for filesystem tools)
/// 3. Execute the operation
/// 4. Return the result as a string
///
/// Expected failures (a missing file, a denied path) are returned as
/// `Ok` strings so they flow back to the model as ordinary content.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::ErrorKind;

use crate::constants::READ_FILE_MAX_LINES;

use super::registry::Tool;
use super::security::WorkspaceRoot;

// ============================================================================
// EchoTool
// ============================================================================

#[derive(Deserialize)]
struct EchoArgs {
    message: String,
}

/// Echoes its input back. No side effects; exercises the dispatch path.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message. Useful for testing."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: EchoArgs =
            serde_json::from_value(args).context("Invalid arguments for echo")?;
        Ok(format!("Echo: {}", args.message))
    }
}

// ============================================================================
// ReadFileTool
// ============================================================================

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

/// Reads files from the working directory.
///
/// Only paths that resolve inside the workspace root are readable; the
/// validation runs on the fully resolved path before any IO happens.
pub struct ReadFileTool {
    workspace: WorkspaceRoot,
}

impl ReadFileTool {
    pub fn new(workspace: WorkspaceRoot) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the specified path. \
         The path must be relative to the working directory."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read, relative to the working directory. \
                                    Example: 'src/main.rs' or 'README.md'"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: ReadFileArgs =
            serde_json::from_value(args).context("Invalid arguments for read_file")?;

        let resolved = match self.workspace.validate(&args.path) {
            Ok(path) => path,
            Err(e) => return Ok(e.to_string()),
        };

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(format!("Error: File not found: {}", args.path));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(format!("Error: Permission denied: {}", args.path));
            }
            Err(e) => {
                return Err(e).context(format!("Failed to access file: {}", args.path));
            }
        };

        if !metadata.is_file() {
            return Ok(format!("Error: Not a file: {}", args.path));
        }

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(format!("Error: Permission denied: {}", args.path));
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read file: {}", args.path));
            }
        };

        let contents = match String::from_utf8(bytes) {
            Ok(contents) => contents,
            Err(_) => return Ok(format!("Error: Cannot read binary file: {}", args.path)),
        };

        let filename = resolved
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| args.path.clone());

        Ok(format_file_contents(
            &filename,
            &contents,
            READ_FILE_MAX_LINES,
        ))
    }
}

/// Render file contents with a header and right-aligned line numbers,
/// truncated after `max_lines` with a trailing marker.
pub(crate) fn format_file_contents(name: &str, contents: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let total = lines.len();
    let truncated = total > max_lines;
    let shown = if truncated { max_lines } else { total };
    let width = total.to_string().len();

    let header = format!("File: {name} ({total} lines)");
    let separator = "-".repeat(header.len().min(50));

    let mut out = String::with_capacity(contents.len() + header.len() + shown * (width + 4) + 64);
    out.push_str(&header);
    out.push('\n');
    out.push_str(&separator);
    for (i, line) in lines.iter().take(shown).enumerate() {
        out.push('\n');
        out.push_str(&format!("{:>width$} │ {}", i + 1, line));
    }
    if truncated {
        out.push('\n');
        out.push_str(&format!(
            "... (truncated, showing {shown} of {total} lines)"
        ));
    }
    out
}
