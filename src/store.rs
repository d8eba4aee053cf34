//! Data access boundary consumed by the report core.
//!
//! [`ReportStore`] is implemented by [`crate::db::PgStore`] for production and
//! by [`crate::memory::InMemoryStore`] for tests and local runs.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::models::{
    AttendanceRecord, DeliveryRequest, ProcessingOutcome, ReportScope, ScheduledReportDefinition,
    StudentSummary,
};

/// Read and write operations the batch processor needs from the data layer.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Enabled definitions whose next run is at or before `now`, optionally
    /// narrowed to one cadence class.
    async fn list_due_definitions(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<Vec<ScheduledReportDefinition>>;

    /// Per-period attendance rows for `date`, joined with the student profile.
    async fn query_attendance(
        &self,
        scope: &ReportScope,
        date: NaiveDate,
    ) -> ReportResult<Vec<AttendanceRecord>>;

    /// Overall attendance per student in scope, ordered by registration number.
    async fn query_attendance_summary(
        &self,
        scope: &ReportScope,
    ) -> ReportResult<Vec<StudentSummary>>;

    /// Resolves display names in one round trip. Unknown ids are absent from
    /// the returned map.
    async fn lookup_student_names(
        &self,
        registration_nos: &[String],
    ) -> ReportResult<HashMap<String, String>>;

    async fn lookup_student_name(&self, registration_no: &str) -> ReportResult<Option<String>> {
        let mut names = self
            .lookup_student_names(&[registration_no.to_string()])
            .await?;
        Ok(names.remove(registration_no))
    }

    async fn append_outcome(&self, outcome: &ProcessingOutcome) -> ReportResult<()>;

    /// Queues every request or none of them.
    async fn enqueue_deliveries(&self, requests: &[DeliveryRequest]) -> ReportResult<()>;

    async fn advance_schedule(&self, definition_id: Uuid, now: DateTime<Utc>) -> ReportResult<()>;
}

/// Applies a timeout to every call made through the wrapped store.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: ReportStore> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn timed<T: Send>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = ReportResult<T>> + Send,
    ) -> ReportResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::DataAccess(format!(
                "{operation} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl<S: ReportStore> ReportStore for TimedStore<S> {
    async fn list_due_definitions(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<Vec<ScheduledReportDefinition>> {
        self.timed(
            "list_due_definitions",
            self.inner.list_due_definitions(frequency, now),
        )
        .await
    }

    async fn query_attendance(
        &self,
        scope: &ReportScope,
        date: NaiveDate,
    ) -> ReportResult<Vec<AttendanceRecord>> {
        self.timed("query_attendance", self.inner.query_attendance(scope, date))
            .await
    }

    async fn query_attendance_summary(
        &self,
        scope: &ReportScope,
    ) -> ReportResult<Vec<StudentSummary>> {
        self.timed(
            "query_attendance_summary",
            self.inner.query_attendance_summary(scope),
        )
        .await
    }

    async fn lookup_student_names(
        &self,
        registration_nos: &[String],
    ) -> ReportResult<HashMap<String, String>> {
        self.timed(
            "lookup_student_names",
            self.inner.lookup_student_names(registration_nos),
        )
        .await
    }

    async fn append_outcome(&self, outcome: &ProcessingOutcome) -> ReportResult<()> {
        self.timed("append_outcome", self.inner.append_outcome(outcome))
            .await
    }

    async fn enqueue_deliveries(&self, requests: &[DeliveryRequest]) -> ReportResult<()> {
        self.timed("enqueue_deliveries", self.inner.enqueue_deliveries(requests))
            .await
    }

    async fn advance_schedule(&self, definition_id: Uuid, now: DateTime<Utc>) -> ReportResult<()> {
        self.timed(
            "advance_schedule",
            self.inner.advance_schedule(definition_id, now),
        )
        .await
    }
}
