use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::constants::{get_default_model, get_max_tokens};

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub max_tokens: u32,
    pub workdir: Option<String>,
    pub stream: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_matches(&Self::build_cli().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            model: matches
                .get_one::<String>("model")
                .cloned()
                .unwrap_or_else(get_default_model),
            max_tokens: matches
                .get_one::<String>("max-tokens")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(get_max_tokens),
            workdir: matches.get_one::<String>("workdir").cloned(),
            stream: !matches.get_flag("no-stream"),
        }
    }

    fn build_cli() -> Command {
        Command::new("skald")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Terminal AI coding assistant using the Anthropic API")
            .arg(
                Arg::new("model")
                    .short('m')
                    .long("model")
                    .value_name("MODEL")
                    .help("Model identifier (overrides SKALD_MODEL)"),
            )
            .arg(
                Arg::new("max-tokens")
                    .long("max-tokens")
                    .value_name("N")
                    .help("Response token ceiling (overrides SKALD_MAX_TOKENS)"),
            )
            .arg(
                Arg::new("workdir")
                    .short('w')
                    .long("workdir")
                    .value_name("DIR")
                    .help("Directory file tools are confined to (defaults to the current directory)"),
            )
            .arg(
                Arg::new("no-stream")
                    .long("no-stream")
                    .action(ArgAction::SetTrue)
                    .help("Print responses whole instead of streaming them"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Config {
        let matches = Config::build_cli()
            .try_get_matches_from(args)
            .expect("arguments should parse");
        Config::from_matches(&matches)
    }

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var("SKALD_MODEL");
        std::env::remove_var("SKALD_MAX_TOKENS");

        let config = parse(&["skald"]);
        assert_eq!(config.model, crate::constants::DEFAULT_MODEL);
        assert_eq!(config.max_tokens, crate::constants::DEFAULT_MAX_TOKENS);
        assert!(config.workdir.is_none());
        assert!(config.stream);
    }

    #[test]
    #[serial]
    fn test_flags_override() {
        let config = parse(&[
            "skald",
            "--model",
            "claude-opus-4-1-20250805",
            "--max-tokens",
            "512",
            "-w",
            "/tmp",
            "--no-stream",
        ]);
        assert_eq!(config.model, "claude-opus-4-1-20250805");
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.workdir.as_deref(), Some("/tmp"));
        assert!(!config.stream);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Config::build_cli()
            .try_get_matches_from(["skald", "--bogus"])
            .is_err());
    }
}
