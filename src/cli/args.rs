use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "searchchat")]
#[command(
    about = "Chat with a local Ollama model, grounded in web search when needed",
    long_about = "Chat with a local Ollama model, grounded in web search when needed\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default lookup path when --config is not provided:\n    1. $XDG_CONFIG_HOME/searchchat/config.toml\n    2. ~/.config/searchchat/config.toml\n\nType `exit` or `quit` (or send EOF) to leave."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log HTTP requests and responses to stderr (secrets redacted).
    #[arg(long)]
    pub verbose: bool,
}
