//! Mapping from Canvas records to calendar event bodies.
//!
//! Everything here is pure so the same record always produces the same
//! event, which is what makes repeated sync runs idempotent.

use chrono::Duration;

use crate::{SourceRecord, TargetEvent};

/// Namespace tag prepended to every derived event id
pub const EVENT_ID_PREFIX: &str = "canvas";

/// Events start this many minutes before the due time and end on it
pub const LEAD_WINDOW_MINUTES: i64 = 60;

/// Summary used when Canvas sends no usable title
pub const UNTITLED_PLACEHOLDER: &str = "Untitled Assignment";

/// Derive the calendar event id for a source record id.
///
/// Lowercases the id, drops anything that is not an ASCII letter or digit
/// and prefixes [`EVENT_ID_PREFIX`]. Depends on nothing but `source_id`.
pub fn normalize_event_id(source_id: &str) -> String {
    let mut event_id = String::with_capacity(EVENT_ID_PREFIX.len() + source_id.len());
    event_id.push_str(EVENT_ID_PREFIX);
    event_id.extend(
        source_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase()),
    );
    event_id
}

/// Compose the event description from title, course and link
pub fn build_description(record: &SourceRecord) -> String {
    let title = record.display_title().unwrap_or(UNTITLED_PLACEHOLDER);

    let mut description = format!("Due: {}", title);
    if let Some(context) = record
        .context_name
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        description.push_str(&format!("\nCourse: {}", context));
    }
    let url = record
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or("N/A");
    description.push_str(&format!("\nView in Canvas: {}", url));

    description
}

/// Build the calendar event for a record.
///
/// Returns `None` when the record has no due date, since nothing can be
/// scheduled for it.
pub fn build_target_event(record: &SourceRecord) -> Option<TargetEvent> {
    let end = record.due_at?;
    let start = end - Duration::minutes(LEAD_WINDOW_MINUTES);

    Some(TargetEvent {
        event_id: normalize_event_id(&record.id),
        summary: record
            .display_title()
            .unwrap_or(UNTITLED_PLACEHOLDER)
            .to_string(),
        description: build_description(record),
        start,
        end,
    })
}
