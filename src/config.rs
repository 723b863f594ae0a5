//! Configuration file parser for ~/.config/reachnews/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::view::DEFAULT_PAGE_SIZE;

/// Hosted GraphQL endpoint serving the feed and user profiles.
pub const DEFAULT_GRAPHQL_URL: &str =
    "https://gglrioqykbigsyblybib.graphql.ap-south-1.nhost.run/v1";

/// Hosted auth service for email/password sessions.
pub const DEFAULT_AUTH_URL: &str = "https://gglrioqykbigsyblybib.auth.ap-south-1.nhost.run/v1";

/// Topics offered for filtering when the config does not list its own.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Technology",
    "Business",
    "Politics",
    "Sports",
    "Entertainment",
    "Health",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GraphQL endpoint for the feed query and profile mutations.
    pub graphql_url: String,

    /// Base URL of the auth service (`/signin/email-password`, `/signup/email-password`, `/signout`).
    pub auth_url: String,

    /// Articles revealed per "show more".
    pub page_size: usize,

    /// Topic catalogue offered by `topic` and shown by `feed`.
    pub topics: Vec<String>,

    /// Mirror every preference change to the remote profile.
    pub remote_sync: bool,

    /// Per-request timeout for GraphQL and auth calls.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            remote_sync: false,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "graphql_url",
        "auth_url",
        "page_size",
        "topics",
        "remote_sync",
        "request_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a huge file is never pulled into memory.
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
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        if config.page_size == 0 {
            tracing::warn!("page_size = 0 in config file, using {}", DEFAULT_PAGE_SIZE);
            config.page_size = DEFAULT_PAGE_SIZE;
        }
        if config.topics.is_empty() {
            config.topics = Self::default().topics;
        }

        tracing::info!(
            path = %path.display(),
            graphql_url = %config.graphql_url,
            remote_sync = config.remote_sync,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Case-insensitive lookup in the topic catalogue, returning its spelling.
    pub fn resolve_topic(&self, name: &str) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| t.eq_ignore_ascii_case(name.trim()))
            .map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================
