//! Reconciliation of Canvas records into calendar events.
//!
//! Records are handled strictly one after another. Each one ends up
//! skipped, created, updated or failed, and no failure stops the loop.

use shared_types::{
    build_target_event, RecordOutcome, RecordReport, SourceRecord, SyncSummary, TargetEvent,
    UNTITLED_PLACEHOLDER,
};

use crate::calendar_client::CalendarTarget;
use crate::canvas_client::SourceFetcher;

/// Result of a full run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub records: Vec<RecordReport>,
    pub summary: SyncSummary,
}

impl SyncReport {
    fn push(&mut self, report: RecordReport) {
        self.summary.record(&report.outcome);
        self.records.push(report);
    }
}

/// Decides create vs. update vs. skip for each record and performs the write
pub struct Reconciler<T> {
    target: T,
    calendar_id: String,
}

impl<T: CalendarTarget> Reconciler<T> {
    pub fn new(target: T, calendar_id: impl Into<String>) -> Self {
        Self {
            target,
            calendar_id: calendar_id.into(),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Reconcile a single record. Never returns an error; failures are
    /// folded into the report.
    pub async fn reconcile(&self, record: &SourceRecord) -> RecordReport {
        let Some(event) = build_target_event(record) else {
            tracing::debug!("Skipping {} (no due date)", record.id);
            return RecordReport {
                record_id: record.id.clone(),
                event_id: None,
                summary: record
                    .display_title()
                    .unwrap_or(UNTITLED_PLACEHOLDER)
                    .to_string(),
                outcome: RecordOutcome::Skipped,
            };
        };

        let outcome = self.write(&event).await;

        match &outcome {
            RecordOutcome::Failed { reason } => tracing::error!(
                "Failed to sync {} ({}): {}",
                event.event_id,
                event.summary,
                reason
            ),
            other => tracing::info!(
                "{} {} ({})",
                other.as_str(),
                event.event_id,
                event.summary
            ),
        }

        RecordReport {
            record_id: record.id.clone(),
            event_id: Some(event.event_id),
            summary: event.summary,
            outcome,
        }
    }

    /// Insert, falling back to update when the id is already taken
    async fn write(&self, event: &TargetEvent) -> RecordOutcome {
        let conflict = match self.target.insert(&self.calendar_id, event).await {
            Ok(()) => return RecordOutcome::Created,
            Err(e) if e.is_conflict() => e,
            Err(e) => {
                return RecordOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        tracing::debug!("{}, updating in place", conflict);

        match self
            .target
            .update(&self.calendar_id, &event.event_id, event)
            .await
        {
            Ok(()) => RecordOutcome::Updated,
            Err(e) => RecordOutcome::Failed {
                reason: format!("update after conflict failed: {}", e),
            },
        }
    }

    /// Reconcile every record in fetch order
    pub async fn run(&self, records: &[SourceRecord]) -> SyncReport {
        self.run_with(records, |_| {}).await
    }

    /// Like [`Reconciler::run`], calling `on_record` as soon as each record
    /// has been handled
    pub async fn run_with(
        &self,
        records: &[SourceRecord],
        mut on_record: impl FnMut(&RecordReport),
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for record in records {
            let entry = self.reconcile(record).await;
            on_record(&entry);
            report.push(entry);
        }
        report
    }
}

/// Fetch source records, treating any failure as an empty run
pub async fn fetch_records<F: SourceFetcher>(fetcher: &F) -> Vec<SourceRecord> {
    match fetcher.fetch().await {
        Ok(records) => {
            tracing::info!("Fetched {} records from Canvas", records.len());
            records
        }
        Err(e) => {
            tracing::error!("Error fetching records from Canvas: {}", e);
            tracing::warn!("Continuing with zero records");
            Vec::new()
        }
    }
}

/// One complete sync: fetch, then reconcile everything that came back
pub async fn run_sync<F, T>(fetcher: &F, reconciler: &Reconciler<T>) -> SyncReport
where
    F: SourceFetcher,
    T: CalendarTarget,
{
    run_sync_with(fetcher, reconciler, |_| {}).await
}

pub async fn run_sync_with<F, T>(
    fetcher: &F,
    reconciler: &Reconciler<T>,
    on_record: impl FnMut(&RecordReport),
) -> SyncReport
where
    F: SourceFetcher,
    T: CalendarTarget,
{
    let records = fetch_records(fetcher).await;
    if records.is_empty() {
        tracing::info!("No upcoming records to sync");
    }
    reconciler.run_with(&records, on_record).await
}

/// Events a run would write, without touching the calendar
pub fn plan(records: &[SourceRecord]) -> Vec<TargetEvent> {
    records.iter().filter_map(build_target_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, WriteError};
    use chrono::{DateTime, Duration, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Insert(String),
        Update(String),
    }

    /// In-memory calendar that behaves like Google for duplicate ids
    #[derive(Default)]
    struct FakeCalendar {
        events: Mutex<HashMap<String, TargetEvent>>,
        calls: Mutex<Vec<Call>>,
        /// Event ids whose insert fails with a non-conflict error
        broken_inserts: HashSet<String>,
        /// Event ids whose update is rejected as unauthorized
        unauthorized_updates: HashSet<String>,
    }

    impl FakeCalendar {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn event(&self, event_id: &str) -> Option<TargetEvent> {
            self.events.lock().unwrap().get(event_id).cloned()
        }

        fn seed(&self, event: TargetEvent) {
            self.events
                .lock()
                .unwrap()
                .insert(event.event_id.clone(), event);
        }
    }

    impl CalendarTarget for FakeCalendar {
        async fn insert(&self, _calendar_id: &str, event: &TargetEvent) -> Result<(), WriteError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Insert(event.event_id.clone()));

            if self.broken_inserts.contains(&event.event_id) {
                return Err(WriteError::Transport("connection reset".to_string()));
            }

            let mut events = self.events.lock().unwrap();
            if events.contains_key(&event.event_id) {
                return Err(WriteError::Conflict(event.event_id.clone()));
            }
            events.insert(event.event_id.clone(), event.clone());
            Ok(())
        }

        async fn update(
            &self,
            _calendar_id: &str,
            event_id: &str,
            event: &TargetEvent,
        ) -> Result<(), WriteError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(event_id.to_string()));

            if self.unauthorized_updates.contains(event_id) {
                return Err(WriteError::Auth("Invalid Credentials".to_string()));
            }

            self.events
                .lock()
                .unwrap()
                .insert(event_id.to_string(), event.clone());
            Ok(())
        }
    }

    struct StaticFetcher(Vec<SourceRecord>);

    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self) -> Result<Vec<SourceRecord>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self) -> Result<Vec<SourceRecord>, FetchError> {
            Err(FetchError::Status {
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: r#"{"errors":[{"message":"Invalid access token."}]}"#.to_string(),
            })
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn record(id: &str, title: &str, due_at: Option<&str>) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            title: Some(title.to_string()),
            due_at: due_at.map(ts),
            context_name: Some("ENGL 101".to_string()),
            url: Some(format!("https://canvas.example.edu/assignments/{}", id)),
        }
    }

    fn essay() -> SourceRecord {
        record("991", "Essay 1", Some("2025-09-21T03:59:59Z"))
    }

    #[tokio::test]
    async fn test_first_run_inserts_second_run_updates() {
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let first = reconciler.reconcile(&essay()).await;
        assert_eq!(first.outcome, RecordOutcome::Created);
        assert_eq!(first.event_id.as_deref(), Some("canvas991"));

        let second = reconciler.reconcile(&essay()).await;
        assert_eq!(second.outcome, RecordOutcome::Updated);
        assert_eq!(second.event_id.as_deref(), Some("canvas991"));

        assert_eq!(
            reconciler.target().calls(),
            vec![
                Call::Insert("canvas991".to_string()),
                Call::Insert("canvas991".to_string()),
                Call::Update("canvas991".to_string()),
            ]
        );

        let stored = reconciler.target().event("canvas991").expect("stored");
        assert_eq!(stored.start, ts("2025-09-21T02:59:59Z"));
        assert_eq!(stored.end, ts("2025-09-21T03:59:59Z"));
    }

    #[tokio::test]
    async fn test_rerun_over_whole_set_never_duplicates() {
        let records = vec![
            record("1", "Quiz 1", Some("2025-09-01T12:00:00Z")),
            record("assignment_2", "Lab 2", Some("2025-09-02T12:00:00Z")),
            record("3", "Project", Some("2025-09-03T12:00:00Z")),
        ];
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let first = reconciler.run(&records).await;
        assert_eq!(first.summary.created, 3);
        assert_eq!(first.summary.updated, 0);

        let second = reconciler.run(&records).await;
        assert_eq!(second.summary.created, 0);
        assert_eq!(second.summary.updated, 3);
        assert!(second
            .records
            .iter()
            .all(|r| r.outcome == RecordOutcome::Updated));

        assert_eq!(reconciler.target().events.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_due_date_change_updates_same_event() {
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");
        reconciler.reconcile(&essay()).await;

        let mut moved = essay();
        moved.title = Some("Essay 1 (extended)".to_string());
        moved.due_at = Some(ts("2025-09-28T03:59:59Z"));
        let report = reconciler.reconcile(&moved).await;

        assert_eq!(report.outcome, RecordOutcome::Updated);
        let stored = reconciler.target().event("canvas991").unwrap();
        assert_eq!(stored.end, ts("2025-09-28T03:59:59Z"));
        assert_eq!(stored.start, stored.end - Duration::hours(1));
        assert_eq!(stored.summary, "Essay 1 (extended)");
    }

    #[tokio::test]
    async fn test_missing_due_date_never_writes() {
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let report = reconciler
            .reconcile(&record("55", "Participation", None))
            .await;

        assert_eq!(report.outcome, RecordOutcome::Skipped);
        assert_eq!(report.event_id, None);
        assert!(reconciler.target().calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_fetch_performs_no_writes() {
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let report = run_sync(&StaticFetcher(Vec::new()), &reconciler).await;

        assert!(report.records.is_empty());
        assert_eq!(report.summary, SyncSummary::default());
        assert!(reconciler.target().calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_soft() {
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let report = run_sync(&FailingFetcher, &reconciler).await;

        assert_eq!(report.summary.total(), 0);
        assert!(reconciler.target().calls().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_then_auth_failure_continues() {
        let calendar = FakeCalendar {
            unauthorized_updates: HashSet::from(["canvas991".to_string()]),
            ..Default::default()
        };
        calendar.seed(shared_types::build_target_event(&essay()).unwrap());

        let records = vec![essay(), record("992", "Essay 2", Some("2025-09-28T03:59:59Z"))];
        let reconciler = Reconciler::new(calendar, "primary");
        let report = reconciler.run(&records).await;

        assert!(report.records[0].outcome.is_failure());
        assert_eq!(report.records[1].outcome, RecordOutcome::Created);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.created, 1);
        assert_eq!(
            reconciler.target().calls(),
            vec![
                Call::Insert("canvas991".to_string()),
                Call::Update("canvas991".to_string()),
                Call::Insert("canvas992".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_conflict_insert_failure_skips_update() {
        let calendar = FakeCalendar {
            broken_inserts: HashSet::from(["canvas991".to_string()]),
            ..Default::default()
        };
        let reconciler = Reconciler::new(calendar, "primary");

        let report = reconciler.reconcile(&essay()).await;

        match report.outcome {
            RecordOutcome::Failed { reason } => assert!(reason.contains("connection reset")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(
            reconciler.target().calls(),
            vec![Call::Insert("canvas991".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mixed_run_summary() {
        let records = vec![
            essay(),
            record("2", "No date", None),
            record("3", "Quiz", Some("2025-09-05T15:00:00Z")),
        ];
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");
        reconciler.reconcile(&records[2]).await;

        let report = run_sync(&StaticFetcher(records), &reconciler).await;

        assert_eq!(
            report.summary,
            SyncSummary {
                created: 1,
                updated: 1,
                skipped: 1,
                failed: 0,
            }
        );
        let outcomes: Vec<&str> = report.records.iter().map(|r| r.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["created", "skipped", "updated"]);
    }

    #[tokio::test]
    async fn test_each_record_reported_as_it_completes() {
        let records = vec![essay(), record("2", "No date", None)];
        let reconciler = Reconciler::new(FakeCalendar::default(), "primary");

        let mut seen = Vec::new();
        let report = run_sync_with(&StaticFetcher(records), &reconciler, |entry| {
            seen.push((
                entry.record_id.clone(),
                entry.outcome.clone(),
                reconciler.target().calls().len(),
            ))
        })
        .await;

        assert_eq!(
            seen,
            vec![
                ("991".to_string(), RecordOutcome::Created, 1),
                ("2".to_string(), RecordOutcome::Skipped, 1),
            ]
        );
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn test_plan_skips_undated_records() {
        let planned = plan(&[essay(), record("2", "No date", None)]);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].event_id, "canvas991");
    }
}
