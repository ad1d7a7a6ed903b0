use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://html.duckduckgo.com";

const CONFIG_DIR_NAME: &str = "searchchat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub ollama_model: String,
    pub ollama_base_url: String,
    pub search_base_url: String,
    pub search_mode: SearchMode,
    pub limits: SearchLimits,
    pub select_results_with_model: bool,
    pub validate_pages_with_model: bool,
    pub show_search_steps: bool,
    pub request_timeout_secs: u64,
    pub theme: ThemeConfig,
}

/// How the router decides whether a turn needs web search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(format!("unknown search mode '{value}'")),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

/// Bounds on how much search material a single turn may pull in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_search_results: usize,
    pub max_snippets: usize,
    pub max_snippet_chars: usize,
    pub max_page_attempts: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_search_results: 10,
            max_snippets: 3,
            max_snippet_chars: 4_000,
            max_page_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    pub preset: ThemePreset,
    pub styles: HashMap<ThemeToken, StyleOverride>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            preset: ThemePreset::Default,
            styles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemePreset {
    Default,
    Light,
    Plain,
}

impl FromStr for ThemePreset {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "light" => Ok(Self::Light),
            "plain" => Ok(Self::Plain),
            _ => Err(format!("unknown preset '{value}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeToken {
    UserPrompt,
    AssistantLabel,
    AssistantText,
    SearchStep,
    SystemInfo,
    SystemError,
}

impl ThemeToken {
    pub fn all() -> [ThemeToken; 6] {
        [
            Self::UserPrompt,
            Self::AssistantLabel,
            Self::AssistantText,
            Self::SearchStep,
            Self::SystemInfo,
            Self::SystemError,
        ]
    }
}

impl FromStr for ThemeToken {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "user_prompt" => Ok(Self::UserPrompt),
            "assistant_label" => Ok(Self::AssistantLabel),
            "assistant_text" => Ok(Self::AssistantText),
            "search_step" => Ok(Self::SearchStep),
            "system_info" => Ok(Self::SystemInfo),
            "system_error" => Ok(Self::SystemError),
            _ => Err(format!("unknown token '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOverride {
    pub fg: Option<HexColor>,
    pub modifiers: Option<Vec<ThemeModifier>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = value.as_bytes();
        if bytes.len() != 7 || bytes[0] != b'#' || !value.is_ascii() {
            return Err("invalid hex color, expected #RRGGBB".to_string());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&value[range], 16)
                .map_err(|_| "invalid hex color, expected #RRGGBB".to_string())
        };

        Ok(Self {
            r: channel(1..3)?,
            g: channel(3..5)?,
            b: channel(5..7)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeModifier {
    Bold,
    Dim,
    Italic,
    Underlined,
    Reversed,
}

impl FromStr for ThemeModifier {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "bold" => Ok(Self::Bold),
            "dim" => Ok(Self::Dim),
            "italic" => Ok(Self::Italic),
            "underlined" => Ok(Self::Underlined),
            "reversed" => Ok(Self::Reversed),
            _ => Err(format!("unknown modifier '{value}'")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    ollama_model: Option<String>,
    ollama_base_url: Option<String>,
    search_base_url: Option<String>,
    search_mode: Option<String>,
    max_search_results: Option<usize>,
    max_snippets: Option<usize>,
    max_snippet_chars: Option<usize>,
    max_page_attempts: Option<usize>,
    select_results_with_model: Option<bool>,
    validate_pages_with_model: Option<bool>,
    show_search_steps: Option<bool>,
    request_timeout_secs: Option<u64>,
    theme: Option<RawThemeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThemeConfig {
    name: Option<String>,
    styles: Option<HashMap<String, RawStyleOverride>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStyleOverride {
    fg: Option<String>,
    modifiers: Option<Vec<String>>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Loads the config file (explicit path or XDG discovery), then applies
    /// `.env` and process environment overrides on top.
    pub fn load_with_path(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    bail!(
                        "Failed to load config {}: file does not exist",
                        path.display()
                    );
                }
                path.to_path_buf()
            }
            None => discover_config_path()?,
        };
        let file_config = load_file_config(&config_path)?.unwrap_or_default();

        dotenvy::dotenv().ok();

        let ollama_model = env_non_empty("OLLAMA_MODEL")
            .or_else(|| file_string(file_config.ollama_model.as_deref()))
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
        let ollama_base_url = env_non_empty("OLLAMA_HOST")
            .or_else(|| file_string(file_config.ollama_base_url.as_deref()))
            .map(|value| normalize_base_url(&value))
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        let search_base_url = env_non_empty("SEARCH_BASE_URL")
            .or_else(|| file_string(file_config.search_base_url.as_deref()))
            .map(|value| normalize_base_url(&value))
            .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string());

        let search_mode = match env_non_empty("SEARCHCHAT_SEARCH_MODE")
            .or_else(|| file_string(file_config.search_mode.as_deref()))
        {
            Some(value) => SearchMode::from_str(&value)
                .map_err(|reason| config_error(&config_path, "search_mode", &reason))?,
            None => SearchMode::default(),
        };

        let defaults = SearchLimits::default();
        let limits = SearchLimits {
            max_search_results: positive(
                file_config.max_search_results,
                defaults.max_search_results,
                &config_path,
                "max_search_results",
            )?,
            max_snippets: positive(
                file_config.max_snippets,
                defaults.max_snippets,
                &config_path,
                "max_snippets",
            )?,
            max_snippet_chars: positive(
                file_config.max_snippet_chars,
                defaults.max_snippet_chars,
                &config_path,
                "max_snippet_chars",
            )?,
            max_page_attempts: positive(
                file_config.max_page_attempts,
                defaults.max_page_attempts,
                &config_path,
                "max_page_attempts",
            )?,
        };

        let request_timeout_secs = match file_config.request_timeout_secs {
            Some(0) => {
                return Err(config_error(
                    &config_path,
                    "request_timeout_secs",
                    "must be >= 1",
                ));
            }
            Some(value) => value,
            None => 120,
        };

        let theme = validate_theme(file_config.theme.as_ref(), &config_path)?;

        Ok(Self {
            config_path,
            ollama_model,
            ollama_base_url,
            search_base_url,
            search_mode,
            limits,
            select_results_with_model: file_config.select_results_with_model.unwrap_or(true),
            validate_pages_with_model: file_config.validate_pages_with_model.unwrap_or(true),
            show_search_steps: file_config.show_search_steps.unwrap_or(true),
            request_timeout_secs,
            theme,
        })
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn validate_theme(raw_theme: Option<&RawThemeConfig>, config_path: &Path) -> Result<ThemeConfig> {
    let Some(theme) = raw_theme else {
        return Ok(ThemeConfig::default());
    };

    let mut config = ThemeConfig::default();

    if let Some(name) = &theme.name {
        config.preset = ThemePreset::from_str(name)
            .map_err(|reason| config_error(config_path, "theme.name", &reason))?;
    }

    if let Some(styles) = &theme.styles {
        for (token_name, raw_style) in styles {
            let token = ThemeToken::from_str(token_name).map_err(|reason| {
                config_error(config_path, &format!("theme.styles.{token_name}"), &reason)
            })?;

            let fg = match raw_style.fg.as_deref() {
                Some(value) => Some(HexColor::from_str(value).map_err(|reason| {
                    config_error(
                        config_path,
                        &format!("theme.styles.{token_name}.fg"),
                        &reason,
                    )
                })?),
                None => None,
            };
            let modifiers =
                parse_modifiers(raw_style.modifiers.as_deref(), config_path, token_name)?;

            config.styles.insert(token, StyleOverride { fg, modifiers });
        }
    }

    Ok(config)
}

fn parse_modifiers(
    values: Option<&[String]>,
    config_path: &Path,
    token_name: &str,
) -> Result<Option<Vec<ThemeModifier>>> {
    let Some(values) = values else {
        return Ok(None);
    };

    values
        .iter()
        .map(|value| {
            ThemeModifier::from_str(value).map_err(|reason| {
                config_error(
                    config_path,
                    &format!("theme.styles.{token_name}.modifiers"),
                    &reason,
                )
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn positive(
    value: Option<usize>,
    default: usize,
    config_path: &Path,
    key_path: &str,
) -> Result<usize> {
    match value {
        Some(0) => Err(config_error(config_path, key_path, "must be >= 1")),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

// Ollama documents OLLAMA_HOST as `host:port`, so a bare authority is accepted.
fn normalize_base_url(value: &str) -> String {
    let value = value.trim_end_matches('/');
    if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| file_string(Some(&value)))
}

fn file_string(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::{
        AppConfig, DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL, DEFAULT_SEARCH_BASE_URL,
        HexColor, SearchLimits, SearchMode, ThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
        normalize_base_url,
    };
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn reset_vars() {
        unsafe {
            env::remove_var("OLLAMA_MODEL");
            env::remove_var("OLLAMA_HOST");
            env::remove_var("SEARCH_BASE_URL");
            env::remove_var("SEARCHCHAT_SEARCH_MODE");
            env::remove_var("XDG_CONFIG_HOME");
        }
    }

    fn with_cwd<T>(path: &Path, f: impl FnOnce() -> T) -> T {
        let cwd = env::current_dir().expect("current dir");
        env::set_current_dir(path).expect("set current dir");
        let result = f();
        env::set_current_dir(cwd).expect("restore current dir");
        result
    }

    fn write_xdg_config(root: &Path, content: &str) -> PathBuf {
        let config_dir = root.join("searchchat");
        fs::create_dir_all(&config_dir).expect("create config dir");
        let path = config_dir.join("config.toml");
        fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    #[serial]
    fn load_uses_defaults_when_nothing_is_configured() {
        let tmp = tempfile::tempdir().expect("tempdir");
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(cfg.ollama_base_url, DEFAULT_OLLAMA_BASE_URL);
        assert_eq!(cfg.search_base_url, DEFAULT_SEARCH_BASE_URL);
        assert_eq!(cfg.search_mode, SearchMode::Auto);
        assert_eq!(cfg.limits, SearchLimits::default());
        assert!(cfg.select_results_with_model);
        assert!(cfg.validate_pages_with_model);
        assert_eq!(cfg.request_timeout_secs, 120);
        assert_eq!(cfg.theme, ThemeConfig::default());
    }

    #[test]
    #[serial]
    fn load_env_overrides_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(
            tmp.path(),
            r#"
ollama_model = "file_model"
ollama_base_url = "http://file-host:1234"
search_mode = "never"
"#,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("OLLAMA_MODEL", "env_model");
            env::set_var("SEARCHCHAT_SEARCH_MODE", "always");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.ollama_model, "env_model");
        assert_eq!(cfg.ollama_base_url, "http://file-host:1234");
        assert_eq!(cfg.search_mode, SearchMode::Always);
    }

    #[test]
    #[serial]
    fn load_does_not_override_existing_os_env_with_dotenv() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join(".env"), "OLLAMA_MODEL=dotenv_model\n").expect("write env");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("OLLAMA_MODEL", "os_model");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.ollama_model, "os_model");
    }

    #[test]
    #[serial]
    fn load_with_explicit_path_reads_that_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("custom.toml");
        fs::write(
            &path,
            r#"
search_base_url = "http://127.0.0.1:9999/"
max_snippets = 1
max_snippet_chars = 200
validate_pages_with_model = false
show_search_steps = false
request_timeout_secs = 5
"#,
        )
        .expect("write config");

        reset_vars();
        let cfg = with_cwd(tmp.path(), || {
            AppConfig::load_with_path(Some(&path)).expect("load config")
        });
        assert_eq!(cfg.config_path, path);
        assert_eq!(cfg.search_base_url, "http://127.0.0.1:9999");
        assert_eq!(cfg.limits.max_snippets, 1);
        assert_eq!(cfg.limits.max_snippet_chars, 200);
        assert_eq!(cfg.limits.max_search_results, 10);
        assert!(!cfg.validate_pages_with_model);
        assert!(!cfg.show_search_steps);
        assert_eq!(cfg.request_timeout_secs, 5);
    }

    #[test]
    #[serial]
    fn load_with_missing_explicit_path_fails() {
        reset_vars();
        let err = AppConfig::load_with_path(Some(Path::new("/definitely/not/here.toml")))
            .expect_err("missing file should fail");
        assert!(err.to_string().contains("file does not exist"));
    }

    #[test]
    #[serial]
    fn load_fails_when_xdg_config_home_is_empty() {
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "   ");
        }

        let err = AppConfig::load().expect_err("load should fail");
        assert!(
            err.to_string()
                .contains("Failed to resolve config path: XDG_CONFIG_HOME is set but empty")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_root_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(tmp.path(), "unknown_key = 1");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let err = with_cwd(tmp.path(), || AppConfig::load().expect_err("load should fail"));
        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    #[serial]
    fn load_fails_on_zero_limit() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(tmp.path(), "max_page_attempts = 0");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let err = with_cwd(tmp.path(), || AppConfig::load().expect_err("load should fail"));
        assert!(err.to_string().contains("max_page_attempts: must be >= 1"));
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_search_mode() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(tmp.path(), r#"search_mode = "sometimes""#);

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let err = with_cwd(tmp.path(), || AppConfig::load().expect_err("load should fail"));
        assert!(
            err.to_string()
                .contains("search_mode: unknown search mode 'sometimes'")
        );
    }

    #[test]
    #[serial]
    fn search_mode_from_env_ignores_case() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(tmp.path(), r#"ollama_model = "file_model""#);

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("SEARCHCHAT_SEARCH_MODE", "Auto");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.search_mode, SearchMode::Auto);
        assert_eq!("NEVER".parse::<SearchMode>(), Ok(SearchMode::Never));
    }

    #[test]
    #[serial]
    fn load_fails_on_invalid_hex_color() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(
            tmp.path(),
            r#"
[theme.styles.user_prompt]
fg = "yellow"
"#,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let err = with_cwd(tmp.path(), || AppConfig::load().expect_err("load should fail"));
        assert!(
            err.to_string()
                .contains("theme.styles.user_prompt.fg: invalid hex color")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_style_token() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(
            tmp.path(),
            r##"
[theme.styles.status_bar]
fg = "#ffffff"
"##,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let err = with_cwd(tmp.path(), || AppConfig::load().expect_err("load should fail"));
        assert!(
            err.to_string()
                .contains("theme.styles.status_bar: unknown token 'status_bar'")
        );
    }

    #[test]
    #[serial]
    fn load_parses_theme_config_with_strong_types() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_xdg_config(
            tmp.path(),
            r##"
[theme]
name = "light"

[theme.styles.assistant_label]
fg = "#A0B1C2"
modifiers = ["bold", "underlined"]
"##,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.theme.preset, ThemePreset::Light);
        let style = cfg
            .theme
            .styles
            .get(&ThemeToken::AssistantLabel)
            .expect("assistant_label style");
        assert_eq!(
            style.fg,
            Some(HexColor {
                r: 0xA0,
                g: 0xB1,
                b: 0xC2
            })
        );
        assert_eq!(
            style.modifiers,
            Some(vec![ThemeModifier::Bold, ThemeModifier::Underlined])
        );
    }

    #[test]
    fn normalize_base_url_adds_scheme_and_strips_slash() {
        assert_eq!(normalize_base_url("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(
            normalize_base_url("https://ollama.internal/"),
            "https://ollama.internal"
        );
    }
}
