//! Error types for the sync pipeline.
//!
//! Each failure domain gets its own enum so callers can decide what is
//! fatal. Only [`ConfigError`] stops the process; fetch and write errors
//! are reported where they happen and the run carries on.

use std::path::PathBuf;

use thiserror::Error;

/// Startup problems: missing settings, missing credentials, failed OAuth.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for our schema
    #[error("Invalid config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Required value absent from both the config file and the environment
    #[error("Configuration error: {0}")]
    Missing(String),

    /// Value present but unusable
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    /// Google OAuth client secret file is not where we expect it
    #[error(
        "Google OAuth client secret not found at {} (download it from your Google Cloud project)",
        .0.display()
    )]
    MissingClientSecret(PathBuf),

    /// Could not build an authenticator or obtain a token
    #[error("Google authorization failed: {0}")]
    Authorization(String),
}

impl ConfigError {
    /// Create a config error for a missing env var
    pub fn missing_env(var_name: &str) -> Self {
        ConfigError::Missing(format!("{} environment variable must be set", var_name))
    }

    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failure retrieving records from Canvas. Soft: the run sees zero records.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure
    #[error("Canvas request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Canvas answered with a non-2xx status
    #[error("Canvas returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Body was not the JSON array we expect
    #[error("Malformed Canvas response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure writing one event to the target calendar. Soft: per record.
#[derive(Debug, Error)]
pub enum WriteError {
    /// An event with this id already exists
    #[error("Event {0} already exists")]
    Conflict(String),

    /// Token missing, expired or rejected
    #[error("Calendar authorization failed: {0}")]
    Auth(String),

    /// Calendar API rejected the request
    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or decoding failure talking to the calendar API
    #[error("Calendar transport error: {0}")]
    Transport(String),
}

impl WriteError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, WriteError::Conflict(_))
    }
}
