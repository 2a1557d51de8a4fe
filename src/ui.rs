//! Terminal output helpers. Pure display, no business logic.

use std::io::Write;
use std::path::Path;

use serde_json::Value;

const BOLD_BLUE: &str = "\x1b[1;34m";
const BOLD_RED: &str = "\x1b[1;31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub fn print_welcome() {
    println!();
    println!(
        "{BOLD_BLUE}Skald{RESET} v{} - AI coding assistant",
        env!("CARGO_PKG_VERSION")
    );
    println!("{DIM}Type 'exit' to quit, 'help' for commands{RESET}");
    println!();
}

pub fn print_working_dir(dir: &Path) {
    println!("{DIM}Working directory: {}{RESET}", dir.display());
    println!();
}

pub fn print_prompt() {
    print!("{BOLD_BLUE}>{RESET} ");
    let _ = std::io::stdout().flush();
}

pub fn print_help() {
    println!();
    println!("Commands:");
    println!("  exit, quit   Exit skald");
    println!("  help         Show this help message");
    println!("  clear        Clear the screen");
    println!();
    println!("Anything else is sent to the assistant. For example:");
    println!("  \"Read the src/main.rs file\"");
    println!("  \"Explain what this project does\"");
    println!();
}

pub fn print_error(message: &str) {
    eprintln!("{BOLD_RED}Error:{RESET} {message}");
}

pub fn print_goodbye() {
    println!("{DIM}Goodbye!{RESET}");
}

pub fn print_interrupted() {
    println!();
    println!("{DIM}(interrupted){RESET}");
}

pub fn clear_screen() {
    print!("\x1b[2J\x1b[1;1H");
    let _ = std::io::stdout().flush();
}

/// Show a tool invocation as `→ name(key="value", ...)`.
pub fn print_tool_call(name: &str, input: &Value) {
    let args = match input.as_object() {
        Some(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}={s:?}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
        None => input.to_string(),
    };
    println!("{DIM}→ {name}({args}){RESET}");
}

/// Show a tool result, truncated so a long file dump does not swamp the
/// conversation view. The model still receives the full text.
pub fn print_tool_result(output: &str) {
    const MAX_PREVIEW_LINES: usize = 6;

    let mut lines = output.lines();
    for line in lines.by_ref().take(MAX_PREVIEW_LINES) {
        println!("{DIM}  {line}{RESET}");
    }
    let remaining = lines.count();
    if remaining > 0 {
        println!("{DIM}  ... ({remaining} more line(s)){RESET}");
    }
}
