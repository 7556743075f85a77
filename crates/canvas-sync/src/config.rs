use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where assignments are read from
    pub canvas: CanvasConfig,

    /// Where events are written to
    #[serde(default)]
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Canvas REST base URL, e.g. "https://canvas.instructure.com/api/v1"
    pub api_url: String,

    /// Personal access token. `CANVAS_API_TOKEN` overrides this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Listing path relative to `api_url`
    #[serde(default = "default_path")]
    pub path: String,

    /// Page size hint sent upstream; only the first page is read
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Upper bound on a single Canvas request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Path to Google OAuth client credentials JSON file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache")]
    pub token_cache_path: PathBuf,

    /// Google calendar to write into
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_cache_path: default_token_cache(),
            calendar_id: default_calendar_id(),
        }
    }
}

fn default_path() -> String {
    "users/self/upcoming_events".to_string()
}

fn default_per_page() -> u32 {
    50
}

fn default_request_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

impl Config {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the configuration from environment variables alone.
    ///
    /// Required: `CANVAS_API_URL`. Everything else falls back to the same
    /// defaults the config file uses.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url =
            lookup("CANVAS_API_URL").ok_or_else(|| ConfigError::missing_env("CANVAS_API_URL"))?;

        let per_page = match lookup("CANVAS_PER_PAGE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("CANVAS_PER_PAGE", "must be a valid number"))?,
            None => default_per_page(),
        };

        let request_timeout_secs = match lookup("CANVAS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::invalid("CANVAS_REQUEST_TIMEOUT_SECS", "must be a valid number")
            })?,
            None => default_request_timeout(),
        };

        Ok(Self {
            canvas: CanvasConfig {
                api_url,
                api_token: lookup("CANVAS_API_TOKEN"),
                path: lookup("CANVAS_API_PATH").unwrap_or_else(default_path),
                per_page,
                request_timeout_secs,
            },
            calendar: CalendarConfig {
                credentials_path: lookup("GOOGLE_CREDENTIALS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_credentials_path),
                token_cache_path: lookup("GOOGLE_TOKEN_CACHE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_token_cache),
                calendar_id: lookup("GOOGLE_CALENDAR_ID").unwrap_or_else(default_calendar_id),
            },
        })
    }

    /// Load from `path` if it exists, otherwise from the environment, then
    /// apply env overrides and validate.
    pub fn resolve(path: &Path) -> Result<Self, ConfigError> {
        Self::resolve_with(path, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            Self::load(path)?
        } else {
            tracing::debug!(
                "No config file at {}, reading configuration from environment",
                path.display()
            );
            Self::from_lookup(&lookup)?
        };

        if let Some(token) = lookup("CANVAS_API_TOKEN") {
            config.canvas.api_token = Some(token);
        }
        config.calendar.calendar_id = config.calendar.calendar_id.trim().to_string();

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.canvas.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::invalid("canvas.api_url", "must not be empty"));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "canvas.api_url",
                format!("'{}' is not an http(s) URL", url),
            ));
        }
        if self.canvas.per_page == 0 {
            return Err(ConfigError::invalid("canvas.per_page", "must be at least 1"));
        }
        if self.canvas.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "canvas.request_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.calendar.calendar_id.trim().is_empty() {
            return Err(ConfigError::invalid("calendar.calendar_id", "must not be empty"));
        }
        self.canvas_token()?;
        Ok(())
    }

    /// The Canvas bearer token, or a fatal error when none was configured
    pub fn canvas_token(&self) -> Result<&str, ConfigError> {
        self.canvas
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ConfigError::Missing(
                    "Canvas access token must be set via canvas.api_token or CANVAS_API_TOKEN"
                        .to_string(),
                )
            })
    }

    /// Full URL of the Canvas listing endpoint
    pub fn canvas_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.canvas.api_url.trim().trim_end_matches('/'),
            self.canvas.path.trim().trim_start_matches('/')
        )
    }

    /// Starter config for `init`. The token is left out so a fresh file
    /// fails fast until one is supplied.
    pub fn example() -> Self {
        Config {
            canvas: CanvasConfig {
                api_url: "https://canvas.instructure.com/api/v1".to_string(),
                api_token: None,
                path: default_path(),
                per_page: default_per_page(),
                request_timeout_secs: default_request_timeout(),
            },
            calendar: CalendarConfig::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
