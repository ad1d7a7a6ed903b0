pub mod agent;
pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod search;
pub mod trace;

use agent::{Assistant, AssistantConfig};
use anyhow::{Result, anyhow};
use cli::{CliArgs, ReplSettings, Theme, run_repl};
use config::{AppConfig, ThemeToken};
use http::{HttpClient, HttpDebugConfig};
use llm::OllamaProvider;
use search::{DuckDuckGoSearch, HttpPageFetcher};
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::BufReader;
use trace::SessionTrace;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = if let Some(path) = args.config.as_deref() {
        AppConfig::load_with_path(Some(path))?
    } else {
        AppConfig::load()?
    };
    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|err| anyhow!("Failed to build HTTP client: {err}"))?;
    let http = HttpClient::new(client, HttpDebugConfig::from_verbose(args.verbose))
        .with_trace(trace.clone());

    let llm = OllamaProvider::new(
        http.clone(),
        config.ollama_model.clone(),
        config.ollama_base_url.clone(),
    );
    let search = DuckDuckGoSearch::new(http.clone(), config.search_base_url.clone());
    let pages = HttpPageFetcher::new(http);
    let assistant = Assistant::new(llm, search, pages, AssistantConfig::from(&config));

    let theme = Theme::from_env(&config.theme);
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "{}",
        theme.paint(
            ThemeToken::SystemInfo,
            &startup_banner(&config, trace.file_path().display())
        )
    )?;

    let settings = ReplSettings {
        theme: &theme,
        trace: &trace,
        show_search_steps: config.show_search_steps,
    };
    run_repl(
        &assistant,
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        &settings,
    )
    .await
}

fn startup_banner(config: &AppConfig, trace_path: impl std::fmt::Display) -> String {
    format!(
        "searchchat: model {} at {}, search mode {}. Type 'exit' to quit.\nSession trace: {trace_path}",
        config.ollama_model, config.ollama_base_url, config.search_mode
    )
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
