//! Mirror Canvas assignment deadlines into a Google Calendar.
//!
//! The [`canvas_client`] fetches deadline records, the [`sync`] module
//! turns each into a calendar event keyed by a stable id, and the
//! [`calendar_client`] writes it, updating in place when it already exists.

pub mod auth;
pub mod calendar_client;
pub mod canvas_client;
pub mod config;
pub mod error;
pub mod sync;

pub use calendar_client::{CalendarTarget, GoogleCalendarClient};
pub use canvas_client::{CanvasClient, SourceFetcher};
pub use config::Config;
pub use error::{ConfigError, FetchError, WriteError};
pub use sync::{Reconciler, SyncReport};
