use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::{ATTENDANCE_THRESHOLD, UNKNOWN_STUDENT};
use crate::models::{ReportScope, StudentSummary};

/// Month (1-based) in which a new academic year begins.
pub const ACADEMIC_YEAR_START_MONTH: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationRow {
    pub registration_no: String,
    pub student_name: String,
    pub section: Option<String>,
    pub total_periods: i64,
    pub attended_periods: i64,
    pub overall_percentage: f64,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterConsolidationStats {
    pub department: String,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub academic_year: String,
    pub total_students: usize,
    pub eligible: usize,
    pub not_eligible: usize,
    pub students: Vec<ConsolidationRow>,
}

/// Inclusive: a student at exactly 75% is eligible.
pub fn is_eligible(percentage: f64) -> bool {
    percentage >= ATTENDANCE_THRESHOLD
}

/// Label such as `2026-27` for the academic year containing `today`.
pub fn academic_year_label(today: NaiveDate) -> String {
    let start_year = if today.month() >= ACADEMIC_YEAR_START_MONTH {
        today.year()
    } else {
        today.year() - 1
    };
    format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100))
}

pub fn semester_consolidation(
    scope: &ReportScope,
    today: NaiveDate,
    summaries: &[StudentSummary],
    names: &HashMap<String, String>,
) -> SemesterConsolidationStats {
    let mut students: Vec<ConsolidationRow> = summaries
        .iter()
        .map(|s| ConsolidationRow {
            registration_no: s.registration_no.clone(),
            student_name: names
                .get(&s.registration_no)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_STUDENT.to_string()),
            section: s.section.clone(),
            total_periods: s.total_periods,
            attended_periods: s.attended_periods,
            overall_percentage: s.overall_percentage,
            eligible: is_eligible(s.overall_percentage),
        })
        .collect();

    students.sort_by(|a, b| a.registration_no.cmp(&b.registration_no));
    let eligible = students.iter().filter(|s| s.eligible).count();

    SemesterConsolidationStats {
        department: scope.department.clone(),
        semester: scope.semester,
        section: scope.section.clone(),
        academic_year: academic_year_label(today),
        total_students: students.len(),
        eligible,
        not_eligible: students.len() - eligible,
        students,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(reg: &str, percentage: f64) -> StudentSummary {
        StudentSummary {
            registration_no: reg.to_string(),
            department: "CSE".to_string(),
            semester: Some(6),
            section: Some("B".to_string()),
            total_periods: 400,
            attended_periods: (percentage * 4.0) as i64,
            overall_percentage: percentage,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn eligibility_is_inclusive_at_threshold() {
        assert!(is_eligible(75.0));
        assert!(!is_eligible(74.99));
    }

    #[test]
    fn consolidates_in_registration_order() {
        let summaries = vec![
            summary("22CS003", 74.99),
            summary("22CS001", 75.0),
            summary("22CS002", 91.2),
        ];
        let names = HashMap::from([("22CS001".to_string(), "Asha Rao".to_string())]);
        let scope = ReportScope::new("CSE").with_semester(6).with_section("B");

        let stats = semester_consolidation(&scope, date(2026, 10, 16), &summaries, &names);

        let order: Vec<&str> = stats
            .students
            .iter()
            .map(|s| s.registration_no.as_str())
            .collect();
        assert_eq!(order, vec!["22CS001", "22CS002", "22CS003"]);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.eligible, 2);
        assert_eq!(stats.not_eligible, 1);
        assert_eq!(stats.students[0].student_name, "Asha Rao");
        assert_eq!(stats.students[1].student_name, UNKNOWN_STUDENT);
        assert!(!stats.students[2].eligible);
        assert_eq!(stats.section.as_deref(), Some("B"));
        assert_eq!(stats.academic_year, "2026-27");
    }

    #[test]
    fn academic_year_rolls_over_at_cutoff_month() {
        assert_eq!(academic_year_label(date(2026, 5, 31)), "2025-26");
        assert_eq!(academic_year_label(date(2026, 6, 1)), "2026-27");
        assert_eq!(academic_year_label(date(2027, 1, 10)), "2026-27");
        assert_eq!(academic_year_label(date(2099, 8, 1)), "2099-00");
    }
}
