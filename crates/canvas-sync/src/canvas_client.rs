//! Canvas REST client for fetching upcoming deadlines.
//!
//! Reads the `users/self/upcoming_events` listing (or whatever path is
//! configured). Only the first page is requested; Canvas's `Link` headers
//! are not followed.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use shared_types::SourceRecord;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ConfigError, FetchError};

/// Anything that can produce the source records for a run
#[allow(async_fn_in_trait)]
pub trait SourceFetcher {
    async fn fetch(&self) -> Result<Vec<SourceRecord>, FetchError>;
}

/// Prefix Canvas may put in front of JSON bodies as CSRF protection
const JSON_GUARD: &str = "while(1);";

/// Longest error body we keep for log output
const MAX_ERROR_BODY: usize = 300;

/// Client for the Canvas LMS API
pub struct CanvasClient {
    http: Client,
    endpoint: String,
    token: String,
    per_page: u32,
}

impl CanvasClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.canvas.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConfigError::invalid("canvas", format!("cannot build HTTP client: {}", e))
            })?;

        Self::with_client(config, http)
    }

    /// Use a preconfigured HTTP client instead of building one
    pub fn with_client(config: &Config, http: Client) -> Result<Self, ConfigError> {
        let token = config.canvas_token()?.to_string();

        Ok(Self {
            http,
            endpoint: config.canvas_endpoint(),
            token,
            per_page: config.canvas.per_page,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch one page of upcoming items
    pub async fn fetch_upcoming(&self) -> Result<Vec<SourceRecord>, FetchError> {
        tracing::debug!("GET {} (per_page={})", self.endpoint, self.per_page);

        let response = self
            .http
            .get(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .query(&[("per_page", self.per_page)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let records = parse_records(&body)?;
        tracing::debug!("Canvas returned {} items", records.len());
        Ok(records)
    }
}

impl SourceFetcher for CanvasClient {
    async fn fetch(&self) -> Result<Vec<SourceRecord>, FetchError> {
        self.fetch_upcoming().await
    }
}

/// Canvas ids are numbers for assignments but strings like
/// `"assignment_123"` for upcoming-event entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CanvasId {
    Number(i64),
    Text(String),
}

impl CanvasId {
    fn into_string(self) -> String {
        match self {
            CanvasId::Number(n) => n.to_string(),
            CanvasId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpcomingItem {
    id: CanvasId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    context_name: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    /// Present on assignment entries
    #[serde(default)]
    assignment: Option<AssignmentDetails>,
}

#[derive(Debug, Deserialize)]
struct AssignmentDetails {
    #[serde(default)]
    due_at: Option<DateTime<Utc>>,
}

impl From<UpcomingItem> for SourceRecord {
    fn from(item: UpcomingItem) -> Self {
        let due_at = item
            .end_at
            .or_else(|| item.assignment.and_then(|a| a.due_at));

        SourceRecord {
            id: item.id.into_string(),
            title: item.title,
            due_at,
            context_name: item.context_name,
            url: item.html_url,
        }
    }
}

/// Decode an upcoming-events response body into source records
pub fn parse_records(body: &str) -> Result<Vec<SourceRecord>, FetchError> {
    let body = body.trim_start();
    let body = body.strip_prefix(JSON_GUARD).unwrap_or(body);

    let items: Vec<UpcomingItem> = serde_json::from_str(body)?;
    Ok(items.into_iter().map(SourceRecord::from).collect())
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
