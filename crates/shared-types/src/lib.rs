use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod event;

pub use event::{
    build_description, build_target_event, normalize_event_id, EVENT_ID_PREFIX, LEAD_WINDOW_MINUTES,
    UNTITLED_PLACEHOLDER,
};

// ============================================================================
// Source Types
// ============================================================================

/// One deadline-bearing item fetched from Canvas.
///
/// Records only live for the duration of a single sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Upstream id, normalized to a string whether Canvas sent a number or not
    pub id: String,
    pub title: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// Course or group name the item belongs to
    pub context_name: Option<String>,
    /// Link back to the item in the Canvas web UI
    pub url: Option<String>,
}

impl SourceRecord {
    /// Title to display, ignoring blank strings
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Target Types
// ============================================================================

/// Calendar event body derived from a [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEvent {
    /// Idempotency key; a pure function of the source record id
    pub event_id: String,
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ============================================================================
// Sync Result Types
// ============================================================================

/// Terminal state of a single record within a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// No due date, nothing was written
    Skipped,
    Created,
    /// Insert hit an existing event and the update succeeded
    Updated,
    Failed { reason: String },
}

impl RecordOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            RecordOutcome::Skipped => "skipped",
            RecordOutcome::Created => "created",
            RecordOutcome::Updated => "updated",
            RecordOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }
}

/// Per-record entry in a sync report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReport {
    pub record_id: String,
    /// Present unless the record was skipped
    pub event_id: Option<String>,
    pub summary: String,
    pub outcome: RecordOutcome,
}

/// Counts of each outcome for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    /// Number of calendar writes that succeeded
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped, {} failed",
            self.created, self.updated, self.skipped, self.failed
        )
    }
}
