//! Configuration file parser for ~/.config/markvault/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos. Connection settings can also come from the
//! environment, which takes precedence over the file.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_BACKEND_URL: &str = "MARKVAULT_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "MARKVAULT_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "MARKVAULT_ACCESS_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing setting `{key}` (set it in the config file or via {env})")]
    Missing { key: &'static str, env: &'static str },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// The custom Debug impl masks `anon_key` and `access_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the hosted backend (auth, records, change stream).
    pub backend_url: Option<String>,

    /// Public API key sent as the `apikey` header.
    pub anon_key: Option<String>,

    /// Session token for the signed-in user.
    pub access_token: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long a bookmark that arrived from another session stays highlighted.
    pub highlight_window_ms: u64,

    /// Ask before deleting a bookmark.
    pub confirm_delete: bool,

    pub feed: FeedSettings,
}

/// `[feed]` table: change stream reconnect and timeout tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Upper bound for the reconnect backoff.
    pub max_backoff_secs: u64,
    /// Reconnect when nothing (not even a heartbeat) arrives for this long.
    pub idle_timeout_secs: u64,
    /// Capacity of the event queue between the feed task and the UI.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            access_token: None,
            request_timeout_secs: 20,
            highlight_window_ms: 2000,
            confirm_delete: true,
            feed: FeedSettings::default(),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            max_backoff_secs: 30,
            idle_timeout_secs: 60,
            queue_capacity: 64,
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

/// Mask secrets in Debug output to prevent leakage into logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("anon_key", &redact(&self.anon_key))
            .field("access_token", &redact(&self.access_token))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("highlight_window_ms", &self.highlight_window_ms)
            .field("confirm_delete", &self.confirm_delete)
            .field("feed", &self.feed)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "backend_url",
        "anon_key",
        "access_token",
        "request_timeout_secs",
        "highlight_window_ms",
        "confirm_delete",
        "feed",
    ];

    const KNOWN_FEED_KEYS: [&'static str; 3] =
        ["max_backoff_secs", "idle_timeout_secs", "queue_capacity"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            backend_url = ?config.backend_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Overlay `MARKVAULT_*` environment variables on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BACKEND_URL) {
            tracing::debug!(env = ENV_BACKEND_URL, "Backend URL taken from environment");
            self.backend_url = Some(url);
        }
        if let Some(key) = get(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
    }

    /// Backend URL, or an error naming where to set it.
    pub fn require_backend_url(&self) -> Result<&str, ConfigError> {
        self.backend_url
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "backend_url",
                env: ENV_BACKEND_URL,
            })
    }

    pub fn require_anon_key(&self) -> Result<SecretString, ConfigError> {
        self.anon_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.to_string()))
            .ok_or(ConfigError::Missing {
                key: "anon_key",
                env: ENV_ANON_KEY,
            })
    }

    /// Session token; empty when nobody is signed in.
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone().unwrap_or_default())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn highlight_window(&self) -> Duration {
        Duration::from_millis(self.highlight_window_ms)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        }
        if key == "feed" {
            if let Some(table) = value.as_table() {
                for feed_key in table.keys() {
                    if !Config::KNOWN_FEED_KEYS.contains(&feed_key.as_str()) {
                        tracing::warn!(key = %format!("feed.{}", feed_key), "Unknown key in config file, ignoring");
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
