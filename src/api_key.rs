use anyhow::{anyhow, Result};

use crate::constants::ANTHROPIC_CONSOLE_URL;

/// Read the Anthropic API key from the environment.
///
/// A missing key is a startup failure with actionable guidance, reported
/// before the interactive loop ever starts.
pub fn get_api_key() -> Result<String> {
    match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(anyhow!(
            "ANTHROPIC_API_KEY environment variable is not set.\n\
             Get your API key from: {ANTHROPIC_CONSOLE_URL}\n\
             Then export it: export ANTHROPIC_API_KEY=sk-ant-..."
        )),
    }
}
