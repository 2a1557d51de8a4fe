use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api_key::get_api_key;
use crate::cli::Config;
use crate::logging::{log_error, log_info};
use crate::provider::{ProviderFactory, ProviderSettings};
use crate::session::{ChatSession, SessionEvent};
use crate::tools::{EchoTool, ReadFileTool, ToolExecutor, ToolRegistry, WorkspaceRoot};
use crate::ui;

pub async fn run_app(config: Config) -> Result<()> {
    let workdir = match &config.workdir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let workspace = WorkspaceRoot::new(&workdir)
        .with_context(|| format!("Failed to open working directory: {}", workdir.display()))?;

    // Startup configuration failures are the only fatal ones; everything
    // after this point keeps the loop alive.
    let api_key = get_api_key()?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(ReadFileTool::new(workspace.clone())));
    log_info(&format!("Registered {} tool(s)", registry.len()));

    let provider = ProviderFactory::create_provider(ProviderSettings {
        model: config.model.clone(),
        api_key,
        max_tokens: config.max_tokens,
    })
    .context("Failed to initialize model provider")?;
    log_info(&format!(
        "Using {} model: {}",
        provider.provider_name(),
        provider.model_name()
    ));

    let executor = ToolExecutor::new(registry);
    let mut session = ChatSession::new(provider, executor);

    ui::print_welcome();
    ui::print_working_dir(workspace.path());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        ui::print_prompt();

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                ui::print_goodbye();
                return Ok(());
            }
            line = lines.next_line() => line.context("Failed to read input")?,
        };
        let Some(line) = line else {
            // Ctrl+D / end of input
            println!();
            ui::print_goodbye();
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                ui::print_goodbye();
                return Ok(());
            }
            "help" => {
                ui::print_help();
                continue;
            }
            "clear" => {
                ui::clear_screen();
                ui::print_welcome();
                continue;
            }
            _ => {}
        }

        println!();
        let outcome = tokio::select! {
            // Interrupting a turn cancels it; the staged turn is dropped
            // with the future and nothing partial reaches history.
            _ = tokio::signal::ctrl_c() => {
                ui::print_interrupted();
                log_info("Turn interrupted, staged turn discarded");
                continue;
            }
            outcome = run_turn(&mut session, input, config.stream) => outcome,
        };

        match outcome {
            Ok(_) => {
                println!();
                println!();
            }
            Err(e) => {
                log_error(&format!("Turn failed: {e:#}"));
                ui::print_error(&format!("{e:#}"));
            }
        }
    }
}

async fn run_turn(session: &mut ChatSession, input: &str, stream: bool) -> Result<String> {
    if stream {
        session.submit_stream(input, &mut display_event).await
    } else {
        let text = session.submit(input).await?;
        println!("{text}");
        Ok(text)
    }
}

fn display_event(event: SessionEvent<'_>) {
    match event {
        SessionEvent::Fragment(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        SessionEvent::ToolCall { name, input } => ui::print_tool_call(name, input),
        SessionEvent::ToolResult { output, .. } => ui::print_tool_result(output),
    }
}
