use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::percentage_label;
use crate::models::{AttendanceRecord, ReportScope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStudentRow {
    pub registration_no: String,
    pub student_name: String,
    pub section: Option<String>,
    pub present_periods: u32,
    pub total_periods: u32,
}

impl DailyStudentRow {
    /// Present for the day if present in at least one period.
    pub fn is_present(&self) -> bool {
        self.present_periods > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendanceStats {
    pub date: NaiveDate,
    pub department: String,
    pub semester: Option<i32>,
    pub total_students: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub percentage: String,
    pub students: Vec<DailyStudentRow>,
}

/// Groups the day's period records by student, keeping first-seen order.
pub fn daily_attendance(
    scope: &ReportScope,
    date: NaiveDate,
    records: &[AttendanceRecord],
) -> DailyAttendanceStats {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut students: Vec<DailyStudentRow> = Vec::new();

    for record in records.iter().filter(|r| r.date == date) {
        let slot = *index.entry(record.registration_no.as_str()).or_insert_with(|| {
            students.push(DailyStudentRow {
                registration_no: record.registration_no.clone(),
                student_name: record.student_name.clone(),
                section: record.section.clone(),
                present_periods: 0,
                total_periods: 0,
            });
            students.len() - 1
        });

        let row = &mut students[slot];
        row.total_periods += 1;
        if record.is_present {
            row.present_periods += 1;
        }
    }

    let total_students = students.len();
    let present_count = students.iter().filter(|s| s.is_present()).count();

    DailyAttendanceStats {
        date,
        department: scope.department.clone(),
        semester: scope.semester,
        total_students,
        present_count,
        absent_count: total_students - present_count,
        percentage: percentage_label(present_count, total_students),
        students,
    }
}
