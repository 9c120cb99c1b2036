//! Auth configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_FIREBASE_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIREBASE_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_AUTH_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AUTH_CONNECT_TIMEOUT_SECS: u64 = 10;
/// ID tokens live for an hour; refresh comfortably before that.
pub const DEFAULT_AUTH_REFRESH_INTERVAL_SECS: u64 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),

    #[error("missing required env var {var}")]
    MissingVar { var: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Firebase,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_AUTH_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_AUTH_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_base_url: String,
    pub token_base_url: String,
    pub timeouts: HttpTimeouts,
    pub refresh_interval_secs: u64,
}

impl FirebaseConfig {
    /// Config pointing at the public endpoints with default timeouts.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            auth_base_url: DEFAULT_FIREBASE_AUTH_BASE_URL.to_owned(),
            token_base_url: DEFAULT_FIREBASE_TOKEN_BASE_URL.to_owned(),
            timeouts: HttpTimeouts::default(),
            refresh_interval_secs: DEFAULT_AUTH_REFRESH_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub provider: ProviderKind,
    /// Present when `provider` is `Firebase`.
    pub firebase: Option<FirebaseConfig>,
    /// Where the memory provider keeps its state between runs.
    pub mock_state_path: Option<PathBuf>,
}

impl AuthConfig {
    /// In-memory provider config, nothing persisted.
    #[must_use]
    pub fn memory() -> Self {
        Self { provider: ProviderKind::Memory, firebase: None, mock_state_path: None }
    }

    /// Build typed auth config from environment variables.
    ///
    /// Required for `firebase`:
    /// - `FIREBASE_API_KEY`
    ///
    /// Optional:
    /// - `AUTH_PROVIDER`: `firebase` (default) or `memory`
    /// - `FIREBASE_AUTH_BASE_URL`: identity toolkit base URL
    /// - `FIREBASE_TOKEN_BASE_URL`: secure token base URL
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 10
    /// - `AUTH_REFRESH_INTERVAL_SECS`: default 3000
    /// - `MOCK_AUTH_STATE_PATH`: JSON file for the memory provider
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider or a missing API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = parse_provider(std::env::var("AUTH_PROVIDER").ok().as_deref())?;
        let mock_state_path = std::env::var("MOCK_AUTH_STATE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let firebase = match provider {
            ProviderKind::Memory => None,
            ProviderKind::Firebase => {
                let api_key = std::env::var("FIREBASE_API_KEY")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingVar { var: "FIREBASE_API_KEY".into() })?;
                Some(FirebaseConfig {
                    api_key,
                    auth_base_url: env_url("FIREBASE_AUTH_BASE_URL", DEFAULT_FIREBASE_AUTH_BASE_URL),
                    token_base_url: env_url("FIREBASE_TOKEN_BASE_URL", DEFAULT_FIREBASE_TOKEN_BASE_URL),
                    timeouts: HttpTimeouts {
                        request_secs: env_parse_u64("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_AUTH_REQUEST_TIMEOUT_SECS),
                        connect_secs: env_parse_u64("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_AUTH_CONNECT_TIMEOUT_SECS),
                    },
                    refresh_interval_secs: env_parse_u64(
                        "AUTH_REFRESH_INTERVAL_SECS",
                        DEFAULT_AUTH_REFRESH_INTERVAL_SECS,
                    ),
                })
            }
        };

        Ok(Self { provider, firebase, mock_state_path })
    }
}

fn env_url(key: &str, default: &str) -> String {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_provider(raw: Option<&str>) -> Result<ProviderKind, ConfigError> {
    match raw.unwrap_or("firebase") {
        "firebase" => Ok(ProviderKind::Firebase),
        "memory" | "mock" => Ok(ProviderKind::Memory),
        other => Err(ConfigError::Parse(format!("unknown AUTH_PROVIDER: {other}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
