use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ReportResult;
use crate::models::{
    AttendanceRecord, Cadence, DeliveryRequest, ProcessingOutcome, ReportScope,
    ScheduledReportDefinition, StudentSummary,
};
use crate::store::ReportStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("22CS001", "Asha Rao", "Computer Science", 5, "A"),
        ("22CS002", "Bilal Khan", "Computer Science", 5, "A"),
        ("22CS003", "Chen Li", "Computer Science", 5, "B"),
        ("22EC001", "Divya Menon", "Electronics", 3, "A"),
    ];

    for (registration_no, name, department, semester, section) in &students {
        sqlx::query(
            r#"
            INSERT INTO campus_sync.students
            (registration_no, student_name, department, semester, section)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (registration_no) DO UPDATE
            SET student_name = EXCLUDED.student_name,
                department = EXCLUDED.department,
                semester = EXCLUDED.semester,
                section = EXCLUDED.section
            "#,
        )
        .bind(registration_no)
        .bind(name)
        .bind(department)
        .bind(semester)
        .bind(section)
        .execute(pool)
        .await?;
    }

    let today = Utc::now().date_naive();
    let presence = [
        ("22CS001", [true, true]),
        ("22CS002", [true, false]),
        ("22CS003", [false, false]),
        ("22EC001", [true, true]),
    ];

    for (registration_no, periods) in presence {
        for (index, is_present) in periods.into_iter().enumerate() {
            upsert_attendance(pool, registration_no, today, index as i32 + 1, is_present).await?;
        }
    }

    let now = Utc::now();
    let schedules = vec![
        (
            Uuid::parse_str("7b0c8a52-5f0e-4d55-9b5e-2f6b8d1c0a01")?,
            "dailyAttendance",
            "Computer Science",
            Some(5),
            None::<&str>,
            vec!["hod.cse@campus-sync.app"],
            "daily",
        ),
        (
            Uuid::parse_str("7b0c8a52-5f0e-4d55-9b5e-2f6b8d1c0a02")?,
            "weeklyLowAttendance",
            "Computer Science",
            None,
            None,
            vec!["hod.cse@campus-sync.app", "advisor.cse@campus-sync.app"],
            "weekly",
        ),
        (
            Uuid::parse_str("7b0c8a52-5f0e-4d55-9b5e-2f6b8d1c0a03")?,
            "semesterConsolidation",
            "Computer Science",
            Some(5),
            Some("A"),
            vec!["exams@campus-sync.app"],
            "monthly",
        ),
    ];

    for (id, report_type, department, semester, section, recipients, frequency) in schedules {
        let recipients: Vec<String> = recipients.into_iter().map(String::from).collect();
        sqlx::query(
            r#"
            INSERT INTO campus_sync.scheduled_reports
            (id, report_type, department, semester, section, recipients,
             frequency, scheduled_hour, scheduled_minute, enabled, next_run)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 8, 0, TRUE, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(report_type)
        .bind(department)
        .bind(semester)
        .bind(section)
        .bind(&recipients)
        .bind(frequency)
        .bind(now - Duration::minutes(1))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn upsert_attendance(
    pool: &PgPool,
    registration_no: &str,
    date: NaiveDate,
    period_number: i32,
    is_present: bool,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO campus_sync.attendance
        (id, registration_no, date, period_number, is_present)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (registration_no, date, period_number) DO UPDATE
        SET is_present = EXCLUDED.is_present
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(registration_no)
    .bind(date)
    .bind(period_number)
    .bind(is_present)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        registration_no: String,
        student_name: String,
        department: String,
        semester: Option<i32>,
        section: Option<String>,
        date: NaiveDate,
        period_number: i32,
        is_present: bool,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO campus_sync.students
            (registration_no, student_name, department, semester, section)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (registration_no) DO UPDATE
            SET student_name = EXCLUDED.student_name,
                department = EXCLUDED.department,
                semester = EXCLUDED.semester,
                section = EXCLUDED.section
            "#,
        )
        .bind(&row.registration_no)
        .bind(&row.student_name)
        .bind(&row.department)
        .bind(row.semester)
        .bind(&row.section)
        .execute(pool)
        .await?;

        let affected = upsert_attendance(
            pool,
            &row.registration_no,
            row.date,
            row.period_number,
            row.is_present,
        )
        .await?;

        if affected > 0 {
            imported += 1;
        }
    }

    Ok(imported)
}

/// Postgres-backed report store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn definition_from_row(row: &PgRow) -> ReportResult<ScheduledReportDefinition> {
    let hour: i32 = row.try_get("scheduled_hour")?;
    let minute: i32 = row.try_get("scheduled_minute")?;

    Ok(ScheduledReportDefinition {
        id: row.try_get("id")?,
        report_type: row.try_get("report_type")?,
        department: row.try_get("department")?,
        semester: row.try_get("semester")?,
        section: row.try_get("section")?,
        recipients: row.try_get("recipients")?,
        cadence: Cadence {
            frequency: row.try_get("frequency")?,
            hour: hour.clamp(0, 23) as u32,
            minute: minute.clamp(0, 59) as u32,
        },
        enabled: row.try_get("enabled")?,
        next_run: row.try_get("next_run")?,
    })
}

fn summary_from_row(row: &PgRow) -> ReportResult<StudentSummary> {
    Ok(StudentSummary {
        registration_no: row.try_get("registration_no")?,
        department: row.try_get("department")?,
        semester: row.try_get("semester")?,
        section: row.try_get("section")?,
        total_periods: row.try_get("total_periods")?,
        attended_periods: row.try_get("attended_periods")?,
        overall_percentage: row.try_get("overall_percentage")?,
    })
}

#[async_trait]
impl ReportStore for PgStore {
    async fn list_due_definitions(
        &self,
        frequency: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<Vec<ScheduledReportDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, report_type, department, semester, section, recipients,
                   frequency, scheduled_hour, scheduled_minute, enabled, next_run
            FROM campus_sync.scheduled_reports
            WHERE enabled = TRUE
              AND next_run <= $1
              AND ($2::text IS NULL OR frequency = $2)
            ORDER BY next_run, id
            "#,
        )
        .bind(now)
        .bind(frequency)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(definition_from_row).collect()
    }

    async fn query_attendance(
        &self,
        scope: &ReportScope,
        date: NaiveDate,
    ) -> ReportResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT a.registration_no, s.student_name, s.section,
                   a.date, a.period_number, a.is_present
            FROM campus_sync.attendance a
            JOIN campus_sync.students s ON s.registration_no = a.registration_no
            WHERE a.date = $1
              AND s.department ILIKE '%' || $2 || '%'
              AND ($3::int4 IS NULL OR s.semester = $3)
              AND ($4::text IS NULL OR s.section = $4)
            ORDER BY a.registration_no, a.period_number
            "#,
        )
        .bind(date)
        .bind(&scope.department)
        .bind(scope.semester)
        .bind(scope.section.as_deref())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(AttendanceRecord {
                registration_no: row.try_get("registration_no")?,
                student_name: row.try_get("student_name")?,
                section: row.try_get("section")?,
                date: row.try_get("date")?,
                period_number: row.try_get("period_number")?,
                is_present: row.try_get("is_present")?,
            });
        }

        Ok(records)
    }

    async fn query_attendance_summary(
        &self,
        scope: &ReportScope,
    ) -> ReportResult<Vec<StudentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT registration_no, department, semester, section,
                   total_periods, attended_periods,
                   overall_percentage::float8 AS overall_percentage
            FROM campus_sync.overall_attendance_summary
            WHERE department ILIKE '%' || $1 || '%'
              AND ($2::int4 IS NULL OR semester = $2)
              AND ($3::text IS NULL OR section = $3)
            ORDER BY registration_no
            "#,
        )
        .bind(&scope.department)
        .bind(scope.semester)
        .bind(scope.section.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn lookup_student_names(
        &self,
        registration_nos: &[String],
    ) -> ReportResult<HashMap<String, String>> {
        if registration_nos.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT registration_no, student_name FROM campus_sync.students \
             WHERE registration_no = ANY($1)",
        )
        .bind(registration_nos)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn append_outcome(&self, outcome: &ProcessingOutcome) -> ReportResult<()> {
        sqlx::query(
            r#"
            INSERT INTO campus_sync.report_logs
            (id, schedule_id, report_type, department, semester, section,
             generated_by, status, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(outcome.id)
        .bind(outcome.definition_id)
        .bind(&outcome.report_type)
        .bind(&outcome.department)
        .bind(outcome.semester)
        .bind(&outcome.section)
        .bind(&outcome.generated_by)
        .bind(outcome.status.as_str())
        .bind(&outcome.error_message)
        .bind(outcome.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enqueue_deliveries(&self, requests: &[DeliveryRequest]) -> ReportResult<()> {
        let mut tx = self.pool.begin().await?;

        for request in requests {
            sqlx::query(
                r#"
                INSERT INTO campus_sync.email_queue
                (id, schedule_id, recipient, subject, body, attachment_url, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(request.id)
            .bind(request.definition_id)
            .bind(&request.recipient)
            .bind(&request.subject)
            .bind(&request.body)
            .bind(&request.attachment_url)
            .bind(request.status.as_str())
            .bind(request.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn advance_schedule(&self, definition_id: Uuid, _now: DateTime<Utc>) -> ReportResult<()> {
        sqlx::query("SELECT campus_sync.update_next_run($1)")
            .bind(definition_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
