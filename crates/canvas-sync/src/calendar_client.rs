use google_calendar3::api::{Event, EventDateTime};
use google_calendar3::hyper_rustls::HttpsConnector;
use google_calendar3::CalendarHub;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared_types::TargetEvent;

use crate::auth::GoogleAuthenticator;
use crate::error::{ConfigError, WriteError};

/// Write side of a calendar service.
///
/// `insert` must report [`WriteError::Conflict`] when an event with the same
/// id already exists so callers can fall back to `update`.
#[allow(async_fn_in_trait)]
pub trait CalendarTarget {
    async fn insert(&self, calendar_id: &str, event: &TargetEvent) -> Result<(), WriteError>;

    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &TargetEvent,
    ) -> Result<(), WriteError>;
}

/// Client for interacting with Google Calendar API
pub struct GoogleCalendarClient {
    hub: CalendarHub<HttpsConnector<HttpConnector>>,
}

impl GoogleCalendarClient {
    pub fn new(auth: GoogleAuthenticator) -> Result<Self, ConfigError> {
        let connector = google_calendar3::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| {
                ConfigError::invalid("tls", format!("failed to load native roots: {}", e))
            })?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = CalendarHub::new(client, auth);

        Ok(Self { hub })
    }
}

impl CalendarTarget for GoogleCalendarClient {
    async fn insert(&self, calendar_id: &str, event: &TargetEvent) -> Result<(), WriteError> {
        let (_, created) = self
            .hub
            .events()
            .insert(to_google_event(event), calendar_id)
            .doit()
            .await
            .map_err(|e| classify_error(e, &event.event_id))?;

        tracing::debug!(
            "Inserted calendar event {} (html link: {:?})",
            event.event_id,
            created.html_link
        );
        Ok(())
    }

    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &TargetEvent,
    ) -> Result<(), WriteError> {
        self.hub
            .events()
            .update(to_google_event(event), calendar_id, event_id)
            .doit()
            .await
            .map_err(|e| classify_error(e, event_id))?;

        tracing::debug!("Updated calendar event {}", event_id);
        Ok(())
    }
}

fn to_google_event(event: &TargetEvent) -> Event {
    Event {
        id: Some(event.event_id.clone()),
        summary: Some(event.summary.clone()),
        description: Some(event.description.clone()),
        start: Some(EventDateTime {
            date_time: Some(event.start),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }),
        end: Some(EventDateTime {
            date_time: Some(event.end),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }),
        // A deleted event keeps its id; overwriting it must also un-cancel it
        status: Some("confirmed".to_string()),
        ..Default::default()
    }
}

/// Map a Google API failure onto our write taxonomy
fn classify_error(err: google_calendar3::Error, event_id: &str) -> WriteError {
    match err {
        google_calendar3::Error::BadRequest(body) => {
            let status = body
                .pointer("/error/code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(400);
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("request rejected")
                .to_string();
            classify_status(status, message, event_id)
        }
        google_calendar3::Error::Failure(response) => {
            let status = response.status();
            let message = status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string();
            classify_status(status.as_u16(), message, event_id)
        }
        google_calendar3::Error::MissingToken(e) => WriteError::Auth(e.to_string()),
        google_calendar3::Error::MissingAPIKey => {
            WriteError::Auth("no API key or token available".to_string())
        }
        other => WriteError::Transport(other.to_string()),
    }
}

fn classify_status(status: u16, message: String, event_id: &str) -> WriteError {
    match status {
        409 => WriteError::Conflict(event_id.to_string()),
        401 | 403 => WriteError::Auth(message),
        _ => WriteError::Api { status, message },
    }
}
