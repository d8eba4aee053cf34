use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};

/// The report kinds the dispatcher knows how to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    DailyAttendance,
    #[serde(rename = "weeklyLowAttendance", alias = "lowAttendance")]
    LowAttendance,
    MonthlyAnalytics,
    SemesterConsolidation,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::DailyAttendance,
        ReportKind::LowAttendance,
        ReportKind::MonthlyAnalytics,
        ReportKind::SemesterConsolidation,
    ];

    /// Parses the tag stored on a schedule row.
    pub fn parse(tag: &str) -> ReportResult<Self> {
        match tag {
            "dailyAttendance" => Ok(Self::DailyAttendance),
            "weeklyLowAttendance" | "lowAttendance" => Ok(Self::LowAttendance),
            "monthlyAnalytics" => Ok(Self::MonthlyAnalytics),
            "semesterConsolidation" => Ok(Self::SemesterConsolidation),
            other => Err(ReportError::UnknownReportKind(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::DailyAttendance => "dailyAttendance",
            Self::LowAttendance => "weeklyLowAttendance",
            Self::MonthlyAnalytics => "monthlyAnalytics",
            Self::SemesterConsolidation => "semesterConsolidation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::DailyAttendance => "Daily Attendance Report",
            Self::LowAttendance => "Weekly Low Attendance Report",
            Self::MonthlyAnalytics => "Monthly Analytics Report",
            Self::SemesterConsolidation => "Semester Consolidation Report",
        }
    }
}

/// How often a definition becomes due, and at what time of day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub frequency: String,
    pub hour: u32,
    pub minute: u32,
}

/// Filters a report is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportScope {
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
}

impl ReportScope {
    pub fn new(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            ..Default::default()
        }
    }

    pub fn with_semester(mut self, semester: i32) -> Self {
        self.semester = Some(semester);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Department and semester only; section is a consolidation-only filter.
    pub fn without_section(&self) -> Self {
        Self {
            department: self.department.clone(),
            semester: self.semester,
            section: None,
        }
    }

    /// Case-insensitive substring match on department, exact match on the rest.
    pub fn matches(
        &self,
        department: &str,
        semester: Option<i32>,
        section: Option<&str>,
    ) -> bool {
        let dept_ok = department
            .to_lowercase()
            .contains(&self.department.to_lowercase());
        let semester_ok = self.semester.is_none() || self.semester == semester;
        let section_ok = match self.section.as_deref() {
            Some(wanted) => section == Some(wanted),
            None => true,
        };
        dept_ok && semester_ok && section_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReportDefinition {
    pub id: Uuid,
    /// Raw tag as stored; parsed per item so an unknown tag fails only that item.
    pub report_type: String,
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub recipients: Vec<String>,
    pub cadence: Cadence,
    pub enabled: bool,
    pub next_run: DateTime<Utc>,
}

impl ScheduledReportDefinition {
    pub fn scope(&self) -> ReportScope {
        ReportScope {
            department: self.department.clone(),
            semester: self.semester,
            section: self.section.clone(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>, frequency: Option<&str>) -> bool {
        self.enabled
            && self.next_run <= now
            && frequency.map_or(true, |f| self.cadence.frequency == f)
    }
}

/// One row per (student, date, period), joined with the student's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub registration_no: String,
    pub student_name: String,
    pub section: Option<String>,
    pub date: NaiveDate,
    pub period_number: i32,
    pub is_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub registration_no: String,
    pub student_name: String,
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
}

/// Overall attendance for one student across all recorded periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub registration_no: String,
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub total_periods: i64,
    pub attended_periods: i64,
    pub overall_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Append-only audit record, one per processed definition per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub report_type: String,
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub generated_by: String,
    pub status: OutcomeStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProcessingOutcome {
    pub fn new(
        definition: &ScheduledReportDefinition,
        result: Result<(), String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (status, error_message) = match result {
            Ok(()) => (OutcomeStatus::Success, None),
            Err(message) => (OutcomeStatus::Failed, Some(message)),
        };
        Self {
            id: Uuid::new_v4(),
            definition_id: definition.id,
            report_type: definition.report_type.clone(),
            department: definition.department.clone(),
            semester: definition.semester,
            section: definition.section.clone(),
            generated_by: "system".to_string(),
            status,
            error_message,
            created_at,
        }
    }
}

/// Queue state written by this crate. The mailer owns every later state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

/// One queued email per recipient of a rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment_url: Option<String>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub id: Uuid,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary returned by one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub message: String,
    pub processed: usize,
    pub results: Vec<ItemResult>,
    /// Due definitions left untouched because the run deadline passed. They
    /// keep their next run and are picked up by the next run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<Uuid>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self {
            message: "No reports due".to_string(),
            processed: 0,
            results: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn from_results(results: Vec<ItemResult>) -> Self {
        Self {
            message: "Reports processed".to_string(),
            processed: results.len(),
            results,
            deferred: Vec::new(),
        }
    }

    /// Summary of a run that hit its deadline with `deferred` still due.
    pub fn cut_short(results: Vec<ItemResult>, deferred: Vec<Uuid>) -> Self {
        Self {
            message: "Run deadline reached; remaining reports deferred".to_string(),
            processed: results.len(),
            results,
            deferred,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.processed - self.succeeded()
    }
}
