mod anthropic;
mod api_key;
mod app;
mod cli;
mod constants;
mod logging;
mod message;
mod prompt;
mod provider;
mod session;
mod sse;
mod tools;
mod ui;

use crate::app::run_app;
use crate::cli::Config;
use crate::logging::{init_logging, setup_file_logging};

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = setup_file_logging() {
        eprintln!("Warning: failed to set up file logging: {e}");
    }

    let config = Config::from_args();

    if let Err(e) = run_app(config).await {
        crate::logging::log_error(&format!("{e:#}"));
        crate::ui::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
