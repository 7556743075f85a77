//! Google OAuth credential acquisition.
//!
//! A cached token in `token_cache_path` is reused, refreshed when expired,
//! and replaced through the interactive browser flow when missing. Whatever
//! the flow obtains is written back to the cache by yup-oauth2.

use google_calendar3::hyper_rustls::HttpsConnector;
use google_calendar3::yup_oauth2::authenticator::Authenticator;
use google_calendar3::yup_oauth2::{self, InstalledFlowAuthenticator, InstalledFlowReturnMethod};
use hyper_util::client::legacy::connect::HttpConnector;

use crate::config::CalendarConfig;
use crate::error::ConfigError;

/// Read/write access to events
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

pub type GoogleAuthenticator = Authenticator<HttpsConnector<HttpConnector>>;

/// Return an authenticator holding a valid token, or a fatal error.
///
/// A token is requested eagerly so that a missing or revoked grant stops
/// the process before anything is fetched or written.
pub async fn authenticate(config: &CalendarConfig) -> Result<GoogleAuthenticator, ConfigError> {
    if !config.credentials_path.exists() {
        return Err(ConfigError::MissingClientSecret(config.credentials_path.clone()));
    }

    let secret = yup_oauth2::read_application_secret(&config.credentials_path)
        .await
        .map_err(|e| {
            ConfigError::Authorization(format!(
                "failed to read OAuth credentials from {}: {}",
                config.credentials_path.display(),
                e
            ))
        })?;

    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(config.token_cache_path.clone())
        .build()
        .await
        .map_err(|e| {
            ConfigError::Authorization(format!("failed to build authenticator: {}", e))
        })?;

    auth.token(&[CALENDAR_SCOPE])
        .await
        .map_err(|e| ConfigError::Authorization(e.to_string()))?;

    tracing::info!(
        "Authorized with Google Calendar (token cache: {})",
        config.token_cache_path.display()
    );

    Ok(auth)
}
