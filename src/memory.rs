//! In-memory [`ReportStore`] used by tests and local dry runs.
//!
//! Mirrors the Postgres schema closely enough for batch behaviour to be
//! identical, including the next-run rules of `update_next_run`. Failures can
//! be injected per operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::models::{
    AttendanceRecord, DeliveryRequest, ProcessingOutcome, ReportScope, ScheduledReportDefinition,
    StudentProfile, StudentSummary,
};
use crate::schedule::next_run_after;
use crate::store::ReportStore;

#[derive(Debug, Clone)]
struct AttendanceEntry {
    registration_no: String,
    date: NaiveDate,
    period_number: i32,
    is_present: bool,
}

#[derive(Debug, Default)]
struct MemoryData {
    definitions: Vec<ScheduledReportDefinition>,
    students: Vec<StudentProfile>,
    attendance: Vec<AttendanceEntry>,
    outcomes: Vec<ProcessingOutcome>,
    deliveries: Vec<DeliveryRequest>,
    advanced: HashMap<Uuid, usize>,
    name_lookups: usize,

    fail_due_fetch: bool,
    fail_deliveries: bool,
    failing_departments: HashSet<String>,
    due_fetch_latency: Option<Duration>,
    outcome_latency: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_definition(&self, definition: ScheduledReportDefinition) {
        self.lock().definitions.push(definition);
    }

    pub fn add_student(&self, student: StudentProfile) {
        self.lock().students.push(student);
    }

    pub fn record_attendance(
        &self,
        registration_no: &str,
        date: NaiveDate,
        period_number: i32,
        is_present: bool,
    ) {
        let mut data = self.lock();
        data.attendance.retain(|e| {
            !(e.registration_no == registration_no
                && e.date == date
                && e.period_number == period_number)
        });
        data.attendance.push(AttendanceEntry {
            registration_no: registration_no.to_string(),
            date,
            period_number,
            is_present,
        });
    }

    /// Makes the due-set query fail.
    pub fn fail_due_fetch(&self) {
        self.lock().fail_due_fetch = true;
    }

    /// Makes every delivery enqueue fail.
    pub fn fail_deliveries(&self) {
        self.lock().fail_deliveries = true;
    }

    /// Makes attendance queries scoped to `department` fail.
    pub fn fail_queries_for(&self, department: &str) {
        self.lock()
            .failing_departments
            .insert(department.to_lowercase());
    }

    pub fn delay_due_fetch(&self, latency: Duration) {
        self.lock().due_fetch_latency = Some(latency);
    }

    pub fn delay_outcome_writes(&self, latency: Duration) {
        self.lock().outcome_latency = Some(latency);
    }

    pub fn outcomes(&self) -> Vec<ProcessingOutcome> {
        self.lock().outcomes.clone()
    }

    pub fn deliveries(&self) -> Vec<DeliveryRequest> {
        self.lock().deliveries.clone()
    }

    pub fn deliveries_for(&self, definition_id: Uuid) -> Vec<DeliveryRequest> {
        self.lock()
            .deliveries
            .iter()
            .filter(|d| d.definition_id == definition_id)
            .cloned()
            .collect()
    }

    pub fn advance_count(&self, definition_id: Uuid) -> usize {
        self.lock()
            .advanced
            .get(&definition_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of name-lookup round trips served.
    pub fn name_lookups(&self) -> usize {
        self.lock().name_lookups
    }

    pub fn definition(&self, definition_id: Uuid) -> Option<ScheduledReportDefinition> {
        self.lock()
            .definitions
            .iter()
            .find(|d| d.id == definition_id)
            .cloned()
    }

    fn check_scope(data: &MemoryData, scope: &ReportScope) -> ReportResult<()> {
        if data
            .failing_departments
            .contains(&scope.department.to_lowercase())
        {
            return Err(ReportError::data_access(format!(
                "attendance query failed for department {}",
                scope.department
            )));
        }
        Ok(())
    }

    fn students_in_scope<'a>(
        data: &'a MemoryData,
        scope: &'a ReportScope,
    ) -> impl Iterator<Item = &'a StudentProfile> + 'a {
        data.students.iter().filter(move |s| {
            scope.matches(&s.department, s.semester, s.section.as_deref())
        })
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn list_due_definitions(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<Vec<ScheduledReportDefinition>> {
        let latency = self.lock().due_fetch_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let data = self.lock();
        if data.fail_due_fetch {
            return Err(ReportError::data_access("schedule store unavailable"));
        }
        Ok(data
            .definitions
            .iter()
            .filter(|d| d.is_due(now, frequency))
            .cloned()
            .collect())
    }

    async fn query_attendance(
        &self,
        scope: &ReportScope,
        date: NaiveDate,
    ) -> ReportResult<Vec<AttendanceRecord>> {
        let data = self.lock();
        Self::check_scope(&data, scope)?;

        let students: HashMap<&str, &StudentProfile> = Self::students_in_scope(&data, scope)
            .map(|s| (s.registration_no.as_str(), s))
            .collect();

        let mut records: Vec<AttendanceRecord> = data
            .attendance
            .iter()
            .filter(|e| e.date == date)
            .filter_map(|e| {
                students
                    .get(e.registration_no.as_str())
                    .map(|student| AttendanceRecord {
                        registration_no: e.registration_no.clone(),
                        student_name: student.student_name.clone(),
                        section: student.section.clone(),
                        date: e.date,
                        period_number: e.period_number,
                        is_present: e.is_present,
                    })
            })
            .collect();

        records.sort_by(|a, b| {
            a.registration_no
                .cmp(&b.registration_no)
                .then(a.period_number.cmp(&b.period_number))
        });
        Ok(records)
    }

    async fn query_attendance_summary(
        &self,
        scope: &ReportScope,
    ) -> ReportResult<Vec<StudentSummary>> {
        let data = self.lock();
        Self::check_scope(&data, scope)?;

        let mut summaries = Vec::new();
        for student in Self::students_in_scope(&data, scope) {
            let (total, attended) = data
                .attendance
                .iter()
                .filter(|e| e.registration_no == student.registration_no)
                .fold((0i64, 0i64), |(total, attended), e| {
                    (total + 1, attended + i64::from(e.is_present))
                });

            if total == 0 {
                continue;
            }

            let percentage = attended as f64 * 100.0 / total as f64;
            summaries.push(StudentSummary {
                registration_no: student.registration_no.clone(),
                department: student.department.clone(),
                semester: student.semester,
                section: student.section.clone(),
                total_periods: total,
                attended_periods: attended,
                overall_percentage: (percentage * 100.0).round() / 100.0,
            });
        }

        summaries.sort_by(|a, b| a.registration_no.cmp(&b.registration_no));
        Ok(summaries)
    }

    async fn lookup_student_names(
        &self,
        registration_nos: &[String],
    ) -> ReportResult<HashMap<String, String>> {
        let mut data = self.lock();
        data.name_lookups += 1;
        let wanted: HashSet<&str> = registration_nos.iter().map(String::as_str).collect();
        Ok(data
            .students
            .iter()
            .filter(|s| wanted.contains(s.registration_no.as_str()))
            .map(|s| (s.registration_no.clone(), s.student_name.clone()))
            .collect())
    }

    async fn append_outcome(&self, outcome: &ProcessingOutcome) -> ReportResult<()> {
        let latency = self.lock().outcome_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.lock().outcomes.push(outcome.clone());
        Ok(())
    }

    async fn enqueue_deliveries(&self, requests: &[DeliveryRequest]) -> ReportResult<()> {
        let mut data = self.lock();
        if data.fail_deliveries {
            return Err(ReportError::data_access("email queue unavailable"));
        }
        data.deliveries.extend_from_slice(requests);
        Ok(())
    }

    async fn advance_schedule(&self, definition_id: Uuid, now: DateTime<Utc>) -> ReportResult<()> {
        let mut data = self.lock();
        let definition = data
            .definitions
            .iter_mut()
            .find(|d| d.id == definition_id)
            .ok_or_else(|| {
                ReportError::data_access(format!("schedule {definition_id} not found"))
            })?;
        definition.next_run = next_run_after(&definition.cadence, now);
        *data.advanced.entry(definition_id).or_insert(0) += 1;
        Ok(())
    }
}
