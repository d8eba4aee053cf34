use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::aggregate::{
    one_decimal, percentage_label, AggregationResult, AttendanceBand, DailyAttendanceStats,
    LowAttendanceStats, MonthlyAnalyticsStats, SemesterConsolidationStats, ATTENDANCE_THRESHOLD,
};
use crate::error::{ReportError, ReportResult};
use crate::models::{DeliveryRequest, DeliveryStatus, ReportKind, ScheduledReportDefinition};

/// A rendered document ready to be queued for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub title: String,
    pub subject: String,
    pub body: String,
    pub attachment_url: Option<String>,
}

impl RenderedReport {
    /// One pending request per recipient.
    pub fn delivery_requests(
        &self,
        definition: &ScheduledReportDefinition,
        created_at: DateTime<Utc>,
    ) -> Vec<DeliveryRequest> {
        definition
            .recipients
            .iter()
            .map(|recipient| DeliveryRequest {
                id: Uuid::new_v4(),
                definition_id: definition.id,
                recipient: recipient.clone(),
                subject: self.subject.clone(),
                body: self.body.clone(),
                attachment_url: self.attachment_url.clone(),
                status: DeliveryStatus::Pending,
                created_at,
            })
            .collect()
    }
}

/// Turns computed statistics into a document.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        definition: &ScheduledReportDefinition,
        result: &AggregationResult,
        generated_at: DateTime<Utc>,
    ) -> ReportResult<RenderedReport>;
}

pub fn report_subject(kind: ReportKind, department: &str, date: NaiveDate) -> String {
    format!("{} - {} ({})", kind.title(), department, date.format("%d/%m/%Y"))
}

/// Renders the HTML email body sent to recipients.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(
        &self,
        definition: &ScheduledReportDefinition,
        result: &AggregationResult,
        generated_at: DateTime<Utc>,
    ) -> ReportResult<RenderedReport> {
        if definition.department.trim().is_empty() {
            return Err(ReportError::render("report has no department"));
        }

        let kind = result.kind();
        if ReportKind::parse(&definition.report_type).ok() != Some(kind) {
            return Err(ReportError::render(format!(
                "{} statistics cannot render a {} schedule",
                kind.tag(),
                definition.report_type
            )));
        }

        let content = match result {
            AggregationResult::DailyAttendance(stats) => daily_html(stats),
            AggregationResult::LowAttendance(stats) => low_attendance_html(stats),
            AggregationResult::MonthlyAnalytics(stats) => monthly_html(stats),
            AggregationResult::SemesterConsolidation(stats) => consolidation_html(stats),
        };

        let title = kind.title();
        let mut output = String::new();
        let _ = writeln!(output, "<!DOCTYPE html>");
        let _ = writeln!(output, "<html>");
        let _ = writeln!(output, "<head>");
        let _ = writeln!(output, "<meta charset=\"UTF-8\">");
        let _ = writeln!(output, "<title>{title}</title>");
        let _ = writeln!(output, "</head>");
        let _ = writeln!(output, "<body>");
        let _ = writeln!(output, "<div class=\"header\"><h1>Campus Sync</h1><p>{title}</p></div>");
        let _ = writeln!(output, "<div class=\"content\">");
        output.push_str(&content);
        let _ = writeln!(output, "</div>");
        let _ = writeln!(
            output,
            "<div class=\"footer\"><p>This is an automated report from Campus Sync. Generated on {}.</p></div>",
            generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(output, "</body>");
        let _ = writeln!(output, "</html>");

        Ok(RenderedReport {
            title: title.to_string(),
            subject: report_subject(kind, &definition.department, generated_at.date_naive()),
            body: output,
            attachment_url: None,
        })
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn or_dash(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "-".to_string())
}

fn scope_lines(output: &mut String, department: &str, semester: Option<i32>) {
    let _ = writeln!(output, "<p><strong>Department:</strong> {}</p>", escape(department));
    if let Some(semester) = semester {
        let _ = writeln!(output, "<p><strong>Semester:</strong> {semester}</p>");
    }
}

fn stat_card(output: &mut String, value: &str, label: &str) {
    let _ = writeln!(
        output,
        "<div class=\"stat-card\"><div class=\"stat-value\">{value}</div><div class=\"stat-label\">{label}</div></div>"
    );
}

fn daily_html(stats: &DailyAttendanceStats) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<h2>Daily Attendance Summary - {}</h2>", stats.date);
    scope_lines(&mut output, &stats.department, stats.semester);

    let _ = writeln!(output, "<div class=\"summary\">");
    stat_card(&mut output, &stats.total_students.to_string(), "Total Students");
    stat_card(&mut output, &stats.present_count.to_string(), "Present");
    stat_card(&mut output, &stats.absent_count.to_string(), "Absent");
    stat_card(&mut output, &format!("{}%", stats.percentage), "Attendance");
    let _ = writeln!(output, "</div>");

    let _ = writeln!(output, "<h3>Student Details</h3>");
    let _ = writeln!(
        output,
        "<table><thead><tr><th>Reg. No.</th><th>Name</th><th>Section</th><th>Periods Present</th><th>Status</th></tr></thead><tbody>"
    );
    for student in &stats.students {
        let (class, status) = if student.is_present() {
            ("status-good", "Present")
        } else {
            ("status-danger", "Absent")
        };
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}/{}</td><td class=\"{class}\">{status}</td></tr>",
            escape(&student.registration_no),
            escape(&student.student_name),
            or_dash(student.section.as_deref()),
            student.present_periods,
            student.total_periods,
        );
    }
    let _ = writeln!(output, "</tbody></table>");
    output
}

fn low_attendance_html(stats: &LowAttendanceStats) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<h2>Weekly Low Attendance Report</h2>");
    scope_lines(&mut output, &stats.department, stats.semester);

    let _ = writeln!(
        output,
        "<div class=\"alert danger\"><strong>Attention Required:</strong> {} students have attendance below {}%</div>",
        stats.total_low_attendance, stats.threshold
    );

    let _ = writeln!(
        output,
        "<table><thead><tr><th>Reg. No.</th><th>Name</th><th>Semester</th><th>Section</th><th>Total Periods</th><th>Attended</th><th>Percentage</th></tr></thead><tbody>"
    );
    for student in &stats.students {
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"status-danger\">{}%</td></tr>",
            escape(&student.registration_no),
            escape(&student.student_name),
            student
                .semester
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            or_dash(student.section.as_deref()),
            student.total_periods,
            student.attended_periods,
            one_decimal(student.overall_percentage),
        );
    }
    let _ = writeln!(output, "</tbody></table>");
    output
}

fn monthly_html(stats: &MonthlyAnalyticsStats) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<h2>Monthly Analytics Report - {}</h2>", stats.month);
    scope_lines(&mut output, &stats.department, stats.semester);

    let _ = writeln!(output, "<div class=\"summary\">");
    stat_card(&mut output, &stats.total_students.to_string(), "Total Students");
    stat_card(&mut output, &format!("{}%", stats.avg_percentage), "Avg Attendance");
    let _ = writeln!(output, "</div>");

    let _ = writeln!(output, "<h3>Attendance Distribution</h3>");
    let _ = writeln!(
        output,
        "<table><thead><tr><th>Category</th><th>Count</th><th>Percentage of Total</th></tr></thead><tbody>"
    );
    for band in [
        AttendanceBand::Excellent,
        AttendanceBand::Good,
        AttendanceBand::Average,
        AttendanceBand::Poor,
    ] {
        let class = match band {
            AttendanceBand::Excellent | AttendanceBand::Good => "status-good",
            AttendanceBand::Average => "status-warning",
            AttendanceBand::Poor => "status-danger",
        };
        let count = stats.distribution.count(band);
        let _ = writeln!(
            output,
            "<tr><td class=\"{class}\">{}</td><td>{count}</td><td>{}%</td></tr>",
            escape(band.label()),
            percentage_label(count, stats.total_students),
        );
    }
    let _ = writeln!(output, "</tbody></table>");
    output
}

fn consolidation_html(stats: &SemesterConsolidationStats) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<h2>Semester Consolidation Report</h2>");
    let _ = writeln!(output, "<p><strong>Department:</strong> {}</p>", escape(&stats.department));
    let _ = writeln!(
        output,
        "<p><strong>Semester:</strong> {}</p>",
        stats
            .semester
            .map(|s| s.to_string())
            .unwrap_or_else(|| "All".to_string())
    );
    if let Some(section) = &stats.section {
        let _ = writeln!(output, "<p><strong>Section:</strong> {}</p>", escape(section));
    }
    let _ = writeln!(output, "<p><strong>Academic Year:</strong> {}</p>", stats.academic_year);

    let _ = writeln!(output, "<div class=\"summary\">");
    stat_card(&mut output, &stats.total_students.to_string(), "Total Students");
    stat_card(
        &mut output,
        &stats.eligible.to_string(),
        &format!("Eligible (&ge;{ATTENDANCE_THRESHOLD}%)"),
    );
    stat_card(
        &mut output,
        &stats.not_eligible.to_string(),
        &format!("Not Eligible (&lt;{ATTENDANCE_THRESHOLD}%)"),
    );
    let _ = writeln!(output, "</div>");

    let _ = writeln!(output, "<h3>Student-wise Summary</h3>");
    let _ = writeln!(
        output,
        "<table><thead><tr><th>S.No</th><th>Reg. No.</th><th>Name</th><th>Section</th><th>Total</th><th>Attended</th><th>Percentage</th><th>Eligible</th></tr></thead><tbody>"
    );
    for (index, student) in stats.students.iter().enumerate() {
        let class = if student.eligible {
            "status-good"
        } else {
            "status-danger"
        };
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{class}\">{}%</td><td class=\"{class}\">{}</td></tr>",
            index + 1,
            escape(&student.registration_no),
            escape(&student.student_name),
            or_dash(student.section.as_deref()),
            student.total_periods,
            student.attended_periods,
            one_decimal(student.overall_percentage),
            if student.eligible { "Yes" } else { "No" },
        );
    }
    let _ = writeln!(output, "</tbody></table>");
    output
}
