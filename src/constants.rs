/// Default model constants
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Get default model from environment variable or default
pub fn get_default_model() -> String {
    std::env::var("SKALD_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

/// Response token ceiling
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Get response token ceiling from environment variable or default
pub fn get_max_tokens() -> u32 {
    std::env::var("SKALD_MAX_TOKENS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

/// How many tool rounds a single turn may take before it is aborted.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

pub fn get_max_tool_rounds() -> usize {
    std::env::var("SKALD_MAX_TOOL_ROUNDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS)
}

/// File-read tool output ceiling
pub const READ_FILE_MAX_LINES: usize = 500;

/// Anthropic API endpoint and version header
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// URL for user guidance when the API key is missing
pub const ANTHROPIC_CONSOLE_URL: &str = "https://console.anthropic.com/";

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_model_without_env_var() {
        env::remove_var("SKALD_MODEL");

        let result = get_default_model();
        assert_eq!(result, DEFAULT_MODEL);
    }

    #[test]
    #[serial]
    fn test_default_model_with_env_var() {
        let custom_model = "claude-opus-4-1-20250805";
        env::set_var("SKALD_MODEL", custom_model);

        let result = get_default_model();
        assert_eq!(result, custom_model);

        env::remove_var("SKALD_MODEL");
    }

    #[test]
    #[serial]
    fn test_max_tokens_with_env_var() {
        env::set_var("SKALD_MAX_TOKENS", "2048");
        assert_eq!(get_max_tokens(), 2048);

        env::remove_var("SKALD_MAX_TOKENS");
        assert_eq!(get_max_tokens(), DEFAULT_MAX_TOKENS);
    }

    #[test]
    #[serial]
    fn test_max_tokens_with_invalid_env_var() {
        env::set_var("SKALD_MAX_TOKENS", "not-a-number");
        assert_eq!(get_max_tokens(), DEFAULT_MAX_TOKENS);

        env::remove_var("SKALD_MAX_TOKENS");
    }

    #[test]
    #[serial]
    fn test_max_tool_rounds_with_env_var() {
        env::set_var("SKALD_MAX_TOOL_ROUNDS", "3");
        assert_eq!(get_max_tool_rounds(), 3);

        env::remove_var("SKALD_MAX_TOOL_ROUNDS");
        assert_eq!(get_max_tool_rounds(), DEFAULT_MAX_TOOL_ROUNDS);
    }
}
