//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use parley_types::MAX_ATTACHMENT_BYTES;

/// Runtime configuration for parley-server.
///
/// Every field has a default so the server starts, in mock mode, without any
/// environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for a daily-rolling log file. Logs go to stdout when unset.
    pub log_dir: Option<String>,

    /// Provider API key. `None` selects the mock provider.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible provider API.
    pub api_base_url: String,

    /// Model identifier sent to the provider.
    pub model: String,

    /// Pause between mock words.
    pub mock_delay: Duration,

    /// Per-file upload limit in bytes.
    pub max_file_bytes: u64,

    /// Limit on a whole request body in bytes.
    pub max_request_bytes: usize,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            api_key: None,
            api_base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-5".to_owned(),
            mock_delay: Duration::from_millis(50),
            max_file_bytes: MAX_ATTACHMENT_BYTES,
            max_request_bytes: 64 * 1024 * 1024,
            cors_allowed_origins: None,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("PARLEY_BIND", &defaults.bind_address),
            log_level: env_or("PARLEY_LOG", &defaults.log_level),
            log_json: std::env::var("PARLEY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            log_dir: env_opt("PARLEY_LOG_DIR"),
            api_key: env_opt("PARLEY_API_KEY").or_else(|| env_opt("OPENAI_API_KEY")),
            api_base_url: env_or("PARLEY_API_BASE_URL", &defaults.api_base_url)
                .trim_end_matches('/')
                .to_owned(),
            model: env_or("PARLEY_MODEL", &defaults.model),
            mock_delay: Duration::from_millis(parse_env("PARLEY_MOCK_DELAY_MS", 50)),
            max_file_bytes: parse_env::<u64>("PARLEY_MAX_FILE_MB", 10) * 1024 * 1024,
            max_request_bytes: parse_env::<usize>("PARLEY_MAX_REQUEST_MB", 64) * 1024 * 1024,
            cors_allowed_origins: env_opt("PARLEY_CORS_ORIGINS"),
        }
    }

    /// `true` when no provider key is configured.
    pub fn mock_mode(&self) -> bool {
        self.api_key.is_none()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Unset and blank both count as absent.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
