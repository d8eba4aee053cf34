use std::collections::HashMap;

use serde::Serialize;

use super::{ATTENDANCE_THRESHOLD, UNKNOWN_STUDENT};
use crate::models::{ReportScope, StudentSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowAttendanceRow {
    pub registration_no: String,
    pub student_name: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub total_periods: i64,
    pub attended_periods: i64,
    pub overall_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowAttendanceStats {
    pub department: String,
    pub semester: Option<i32>,
    pub threshold: f64,
    pub total_low_attendance: usize,
    pub students: Vec<LowAttendanceRow>,
}

/// Strictly below the threshold; a student at exactly 75% is not flagged.
pub fn is_low(percentage: f64) -> bool {
    percentage < ATTENDANCE_THRESHOLD
}

/// Registration numbers whose names the low-attendance report will need.
pub fn flagged_ids(summaries: &[StudentSummary]) -> Vec<String> {
    summaries
        .iter()
        .filter(|s| is_low(s.overall_percentage))
        .map(|s| s.registration_no.clone())
        .collect()
}

pub fn low_attendance(
    scope: &ReportScope,
    summaries: &[StudentSummary],
    names: &HashMap<String, String>,
) -> LowAttendanceStats {
    let mut students: Vec<LowAttendanceRow> = summaries
        .iter()
        .filter(|s| is_low(s.overall_percentage))
        .map(|s| LowAttendanceRow {
            registration_no: s.registration_no.clone(),
            student_name: names
                .get(&s.registration_no)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_STUDENT.to_string()),
            semester: s.semester,
            section: s.section.clone(),
            total_periods: s.total_periods,
            attended_periods: s.attended_periods,
            overall_percentage: s.overall_percentage,
        })
        .collect();

    students.sort_by(|a, b| a.overall_percentage.total_cmp(&b.overall_percentage));

    LowAttendanceStats {
        department: scope.department.clone(),
        semester: scope.semester,
        threshold: ATTENDANCE_THRESHOLD,
        total_low_attendance: students.len(),
        students,
    }
}
