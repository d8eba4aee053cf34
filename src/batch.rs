//! Batch processing of due report definitions.
//!
//! A run fetches the due set once, then processes each definition in store
//! order. Every item goes through a fault boundary: its aggregation, render
//! and delivery-queue errors become a Failed outcome and the loop moves on.
//! Only failure to fetch the due set aborts the run. The run timeout stops
//! the loop between definitions and leaves the rest due.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::dispatch::dispatch;
use crate::error::{ReportError, ReportResult};
use crate::models::{BatchResult, ItemResult, ProcessingOutcome, ScheduledReportDefinition};
use crate::report::{HtmlRenderer, Renderer};
use crate::schedule::SchedulerUpdater;
use crate::store::{ReportStore, TimedStore};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Upper bound for one whole run.
    pub run_timeout: Duration,
    /// Upper bound for each store call.
    pub io_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(300),
            io_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BatchProcessor<S, R = HtmlRenderer> {
    store: TimedStore<S>,
    renderer: R,
    run_timeout: Duration,
}

impl<S: ReportStore> BatchProcessor<S, HtmlRenderer> {
    pub fn new(store: S, options: BatchOptions) -> Self {
        Self::with_renderer(store, HtmlRenderer, options)
    }
}

impl<S: ReportStore, R: Renderer> BatchProcessor<S, R> {
    pub fn with_renderer(store: S, renderer: R, options: BatchOptions) -> Self {
        Self {
            store: TimedStore::new(store, options.io_timeout),
            renderer,
            run_timeout: options.run_timeout,
        }
    }

    pub async fn process_due_reports(&self, frequency: Option<&str>) -> ReportResult<BatchResult> {
        self.process_due_reports_at(frequency, Utc::now()).await
    }

    /// Runs one batch as of `now`.
    ///
    /// The run deadline is checked between definitions and never inside one,
    /// so a definition that has started always gets its outcome and advance.
    /// Definitions still waiting when the deadline passes stay due and are
    /// listed in [`BatchResult::deferred`].
    pub async fn process_due_reports_at(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<BatchResult> {
        let deadline = Instant::now() + self.run_timeout;
        info!(
            frequency = frequency.unwrap_or("any"),
            "Processing scheduled reports"
        );

        let due = tokio::time::timeout_at(deadline, self.due_definitions(frequency, now))
            .await
            .map_err(|_| ReportError::RunTimeout(self.run_timeout))??;
        if due.is_empty() {
            info!("No reports due for processing");
            return Ok(BatchResult::empty());
        }

        info!(count = due.len(), "Found reports to process");

        let mut results = Vec::with_capacity(due.len());
        for (index, definition) in due.iter().enumerate() {
            if Instant::now() >= deadline {
                let deferred: Vec<Uuid> = due[index..].iter().map(|d| d.id).collect();
                warn!(
                    processed = results.len(),
                    deferred = deferred.len(),
                    timeout = ?self.run_timeout,
                    "Run deadline reached, deferring remaining reports"
                );
                return Ok(BatchResult::cut_short(results, deferred));
            }
            results.push(self.process_one(definition, now).await);
        }

        let summary = BatchResult::from_results(results);
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Finished processing scheduled reports"
        );
        Ok(summary)
    }

    /// Definitions that a run at `now` would process.
    pub async fn due_definitions(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<Vec<ScheduledReportDefinition>> {
        self.store
            .list_due_definitions(frequency, now)
            .await
            .map_err(|e| ReportError::DueSetFetch(e.to_string()))
    }

    /// Fault boundary for one definition. Never fails: the outcome is logged,
    /// the schedule advanced, and the result returned either way.
    async fn process_one(
        &self,
        definition: &ScheduledReportDefinition,
        now: DateTime<Utc>,
    ) -> ItemResult {
        let span = tracing::info_span!(
            "report",
            report_id = %definition.id,
            report_type = %definition.report_type,
            department = %definition.department,
        );

        async {
            let result = self.generate(definition, now).await;
            match &result {
                Ok(queued) => info!(queued = *queued, "Successfully processed report"),
                Err(e) => error!(error = %e, "Error processing report"),
            }

            let outcome = ProcessingOutcome::new(
                definition,
                result.map(|_| ()).map_err(|e| e.to_string()),
                now,
            );
            if let Err(e) = self.store.append_outcome(&outcome).await {
                error!(error = %e, "Failed to record report outcome");
            }

            if let Err(e) = SchedulerUpdater::new(&self.store)
                .advance(definition.id, now)
                .await
            {
                error!(error = %e, "Failed to advance next run");
            }

            ItemResult {
                id: definition.id,
                status: outcome.status,
                error: outcome.error_message,
            }
        }
        .instrument(span)
        .await
    }

    /// Aggregate, render and queue deliveries. Returns the number queued.
    async fn generate(
        &self,
        definition: &ScheduledReportDefinition,
        now: DateTime<Utc>,
    ) -> ReportResult<usize> {
        let aggregation = dispatch(&self.store, definition, now.date_naive()).await?;
        let rendered = self.renderer.render(definition, &aggregation, now)?;

        let requests = rendered.delivery_requests(definition, now);
        if !requests.is_empty() {
            self.store.enqueue_deliveries(&requests).await?;
        }
        Ok(requests.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationResult;
    use crate::memory::InMemoryStore;
    use crate::models::{Cadence, OutcomeStatus, StudentProfile};
    use crate::report::RenderedReport;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    fn definition(
        report_type: &str,
        department: &str,
        recipients: &[&str],
    ) -> ScheduledReportDefinition {
        ScheduledReportDefinition {
            id: Uuid::new_v4(),
            report_type: report_type.to_string(),
            department: department.to_string(),
            semester: None,
            section: None,
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            cadence: Cadence {
                frequency: "daily".to_string(),
                hour: 8,
                minute: 0,
            },
            enabled: true,
            next_run: now() - chrono::Duration::hours(1),
        }
    }

    fn store_with_students() -> InMemoryStore {
        let store = InMemoryStore::new();
        let today: NaiveDate = now().date_naive();
        for (reg, presence) in [
            ("R1", [true, true]),
            ("R2", [true, false]),
            ("R3", [false, false]),
        ] {
            store.add_student(StudentProfile {
                registration_no: reg.to_string(),
                student_name: format!("Student {reg}"),
                department: "CSE".to_string(),
                semester: Some(5),
                section: Some("A".to_string()),
            });
            for (period, present) in presence.into_iter().enumerate() {
                store.record_attendance(reg, today, period as i32 + 1, present);
            }
        }
        store
    }

    fn processor(store: &InMemoryStore) -> BatchProcessor<InMemoryStore> {
        BatchProcessor::new(store.clone(), BatchOptions::default())
    }

    #[tokio::test]
    async fn empty_due_set_is_not_an_error() {
        let store = store_with_students();
        let result = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result, BatchResult::empty());
        assert!(store.outcomes().is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_fails_alone_and_both_are_rescheduled() {
        let store = store_with_students();
        let unknown = definition("yearlyDigest", "CSE", &["dean@campus.edu"]);
        let daily = definition("dailyAttendance", "CSE", &["hod@campus.edu"]);
        store.add_definition(unknown.clone());
        store.add_definition(daily.clone());

        let result = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result.processed, 2);
        assert_eq!(result.results[0].id, unknown.id);
        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert_eq!(
            result.results[0].error.as_deref(),
            Some("Unknown report type: yearlyDigest")
        );
        assert_eq!(result.results[1].status, OutcomeStatus::Success);

        let outcomes = store.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[1].status, OutcomeStatus::Success);
        assert_eq!(outcomes[1].error_message, None);

        for id in [unknown.id, daily.id] {
            assert_eq!(store.advance_count(id), 1);
            assert!(store.definition(id).unwrap().next_run > now());
        }

        assert!(store.deliveries_for(unknown.id).is_empty());
        let delivered = store.deliveries_for(daily.id);
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].body.contains("66.7%"));
    }

    #[tokio::test]
    async fn one_outcome_per_due_definition_regardless_of_failures() {
        let store = store_with_students();
        store.fail_queries_for("ECE");
        let definitions = vec![
            definition(
                "dailyAttendance",
                "CSE",
                &["a@campus.edu", "b@campus.edu", "c@campus.edu"],
            ),
            definition("monthlyAnalytics", "ECE", &["a@campus.edu"]),
            definition("weeklyLowAttendance", "CSE", &[]),
            definition("bogus", "CSE", &["a@campus.edu"]),
            definition("semesterConsolidation", "CSE", &["a@campus.edu", "b@campus.edu"]),
        ];
        for def in &definitions {
            store.add_definition(def.clone());
        }

        let result = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result.processed, definitions.len());
        assert_eq!(store.outcomes().len(), definitions.len());
        assert_eq!(result.succeeded(), 3);
        assert_eq!(result.failed(), 2);

        let expected_deliveries = [3, 0, 0, 0, 2];
        for (def, expected) in definitions.iter().zip(expected_deliveries) {
            assert_eq!(store.deliveries_for(def.id).len(), expected);
            assert_eq!(store.advance_count(def.id), 1);
        }
    }

    #[tokio::test]
    async fn delivery_queue_failure_leaves_no_partial_set() {
        let store = store_with_students();
        store.fail_deliveries();
        let def = definition("dailyAttendance", "CSE", &["a@campus.edu", "b@campus.edu"]);
        store.add_definition(def.clone());

        let result = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert!(store.deliveries().is_empty());
        assert_eq!(store.advance_count(def.id), 1);
    }

    #[tokio::test]
    async fn due_set_fetch_failure_aborts_run() {
        let store = store_with_students();
        store.add_definition(definition("dailyAttendance", "CSE", &["a@campus.edu"]));
        store.fail_due_fetch();

        let err = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::DueSetFetch(_)));
        assert!(err.is_batch_level());
        assert!(store.outcomes().is_empty());
    }

    #[tokio::test]
    async fn slow_due_set_fetch_times_out() {
        let store = store_with_students();
        store.delay_due_fetch(Duration::from_millis(200));
        let options = BatchOptions {
            run_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_millis(20),
        };

        let err = BatchProcessor::new(store.clone(), options)
            .process_due_reports_at(None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::DueSetFetch(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn whole_run_timeout_is_batch_level() {
        let store = store_with_students();
        store.delay_due_fetch(Duration::from_millis(200));
        let options = BatchOptions {
            run_timeout: Duration::from_millis(20),
            io_timeout: Duration::from_secs(5),
        };

        let err = BatchProcessor::new(store.clone(), options)
            .process_due_reports_at(None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::RunTimeout(_)));
    }

    #[tokio::test]
    async fn run_deadline_never_interrupts_a_started_report() {
        let store = store_with_students();
        store.delay_outcome_writes(Duration::from_millis(200));
        let first = definition("dailyAttendance", "CSE", &["a@campus.edu", "b@campus.edu"]);
        let second = definition("dailyAttendance", "CSE", &["c@campus.edu"]);
        store.add_definition(first.clone());
        store.add_definition(second.clone());
        let options = BatchOptions {
            run_timeout: Duration::from_millis(50),
            io_timeout: Duration::from_secs(5),
        };

        let result = BatchProcessor::new(store.clone(), options)
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.results[0].id, first.id);
        assert_eq!(result.results[0].status, OutcomeStatus::Success);
        assert_eq!(result.deferred, vec![second.id]);
        assert!(!result.is_complete());

        let outcomes = store.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].definition_id, first.id);
        assert_eq!(store.deliveries_for(first.id).len(), 2);
        assert_eq!(store.advance_count(first.id), 1);
        assert!(store.definition(first.id).unwrap().next_run > now());

        assert!(store.deliveries_for(second.id).is_empty());
        assert_eq!(store.advance_count(second.id), 0);
        assert!(store.definition(second.id).unwrap().is_due(now(), None));
    }

    #[tokio::test]
    async fn frequency_filter_and_disabled_definitions() {
        let store = store_with_students();
        let daily = definition("dailyAttendance", "CSE", &[]);
        let mut weekly = definition("weeklyLowAttendance", "CSE", &[]);
        weekly.cadence.frequency = "weekly".to_string();
        let mut disabled = definition("dailyAttendance", "CSE", &[]);
        disabled.enabled = false;
        let mut future = definition("dailyAttendance", "CSE", &[]);
        future.next_run = now() + chrono::Duration::minutes(5);
        for def in [&daily, &weekly, &disabled, &future] {
            store.add_definition(def.clone());
        }

        let result = processor(&store)
            .process_due_reports_at(Some("weekly"), now())
            .await
            .unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.results[0].id, weekly.id);

        let result = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.results[0].id, daily.id);
        assert_eq!(store.advance_count(disabled.id), 0);
        assert_eq!(store.advance_count(future.id), 0);
    }

    #[tokio::test]
    async fn processed_definitions_are_not_due_again_in_the_same_slot() {
        let store = store_with_students();
        store.add_definition(definition("bogus", "CSE", &[]));

        let first = processor(&store)
            .process_due_reports_at(None, now())
            .await
            .unwrap();
        assert_eq!(first.processed, 1);

        let second = processor(&store)
            .process_due_reports_at(None, now() + chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(second.processed, 0);
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(
            &self,
            _definition: &ScheduledReportDefinition,
            _result: &AggregationResult,
            _generated_at: DateTime<Utc>,
        ) -> ReportResult<RenderedReport> {
            Err(ReportError::render("template missing"))
        }
    }

    #[tokio::test]
    async fn render_failure_is_isolated_to_the_item() {
        let store = store_with_students();
        let def = definition("dailyAttendance", "CSE", &["a@campus.edu"]);
        store.add_definition(def.clone());

        let processor =
            BatchProcessor::with_renderer(store.clone(), FailingRenderer, BatchOptions::default());
        let result = processor
            .process_due_reports_at(None, now())
            .await
            .unwrap();

        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert_eq!(
            result.results[0].error.as_deref(),
            Some("Render error: template missing")
        );
        assert!(store.deliveries().is_empty());
        assert_eq!(store.advance_count(def.id), 1);
    }

    #[test]
    fn batch_result_serializes_like_the_http_response() {
        let id = Uuid::nil();
        let result = BatchResult::from_results(vec![ItemResult {
            id,
            status: OutcomeStatus::Success,
            error: None,
        }]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Reports processed",
                "processed": 1,
                "results": [{ "id": id.to_string(), "status": "success" }],
            })
        );
    }
}
