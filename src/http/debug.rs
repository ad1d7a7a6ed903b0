use reqwest::Url;
use reqwest::header::HeaderValue;
use serde_json::Value;

const REDACTION: &str = "***REDACTED***";
const SENSITIVE_KEYS: [&str; 9] = [
    "api_key",
    "apikey",
    "token",
    "access_token",
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "password",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 4_000,
        }
    }

    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }
}

pub fn redact_url(url: &Url, enable_redaction: bool) -> String {
    if !enable_redaction || url.query().is_none() {
        return url.as_str().to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if is_sensitive_key(k.as_ref()) {
                REDACTION.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.set_query(None);
    if !pairs.is_empty() {
        let mut qp = redacted.query_pairs_mut();
        for (k, v) in pairs {
            qp.append_pair(&k, &v);
        }
    }

    redacted.as_str().to_string()
}

pub fn redact_header_value(name: &str, value: &HeaderValue, enable_redaction: bool) -> String {
    if enable_redaction && is_sensitive_key(name) {
        REDACTION.to_string()
    } else {
        value
            .to_str()
            .map(ToString::to_string)
            .unwrap_or_else(|_| "<non-utf8>".to_string())
    }
}

/// Masks sensitive keys anywhere in a JSON body; non-JSON bodies (HTML pages,
/// NDJSON streams) pass through unchanged.
pub fn redact_text_body(raw: &str, enable_redaction: bool) -> String {
    if !enable_redaction {
        return raw.to_string();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            redact_json_value(&mut json);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    }
}

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let count = input.chars().count();
    if count <= max_chars {
        return input.to_string();
    }

    let truncated = input.chars().take(max_chars).collect::<String>();
    format!("{truncated}... <truncated {} chars>", count - max_chars)
}

fn redact_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_sensitive_key(key) {
                    *item = Value::String(REDACTION.to_string());
                } else {
                    redact_json_value(item);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_json_value(item);
            }
        }
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::{
        HttpDebugConfig, redact_header_value, redact_text_body, redact_url, truncate_for_log,
    };
    use reqwest::Url;
    use reqwest::header::HeaderValue;

    #[test]
    fn from_verbose_defaults_to_redaction() {
        let cfg = HttpDebugConfig::from_verbose(true);
        assert!(cfg.enabled);
        assert!(cfg.redact_secrets);
        assert_eq!(cfg.max_body_chars, 4_000);
        assert!(!HttpDebugConfig::disabled().enabled);
    }

    #[test]
    fn redact_url_masks_sensitive_query_params_only() {
        let url = Url::parse("https://example.com/html/?q=rust+lang&token=super-secret")
            .expect("url");
        let redacted = redact_url(&url, true);
        assert!(redacted.contains("q=rust+lang"));
        assert!(!redacted.contains("super-secret"));
    }

    #[test]
    fn redact_url_leaves_query_less_urls_untouched() {
        let url = Url::parse("http://localhost:11434/api/chat").expect("url");
        assert_eq!(redact_url(&url, true), "http://localhost:11434/api/chat");
    }

    #[test]
    fn redact_header_value_masks_cookies() {
        let value = HeaderValue::from_static("session=abc");
        assert_eq!(redact_header_value("Cookie", &value, true), "***REDACTED***");
        assert_eq!(redact_header_value("Cookie", &value, false), "session=abc");
        assert_eq!(
            redact_header_value("content-type", &HeaderValue::from_static("text/html"), true),
            "text/html"
        );
    }

    #[test]
    fn redact_text_body_masks_nested_json_keys() {
        let raw = r#"{"model":"llama3.2","options":{"api_key":"123"},"stream":true}"#;
        let redacted = redact_text_body(raw, true);
        assert!(redacted.contains("\"api_key\":\"***REDACTED***\""));
        assert!(redacted.contains("\"model\":\"llama3.2\""));
        assert!(!redacted.contains("123"));
    }

    #[test]
    fn redact_text_body_passes_html_through() {
        let raw = "<html><body>token</body></html>";
        assert_eq!(redact_text_body(raw, true), raw);
    }

    #[test]
    fn truncate_for_log_appends_marker() {
        let out = truncate_for_log("abcdefghijklmnopqrstuvwxyz", 5);
        assert!(out.starts_with("abcde"));
        assert!(out.contains("<truncated 21 chars>"));
    }
}
