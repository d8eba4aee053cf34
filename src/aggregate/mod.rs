//! Statistic aggregators, one per report kind.
//!
//! Each aggregator is a pure function over rows already fetched from the
//! store. Absence of data yields zero-valued statistics, never an error.

pub mod daily;
pub mod low;
pub mod monthly;
pub mod semester;

use serde::Serialize;

use crate::models::ReportKind;

pub use daily::{daily_attendance, DailyAttendanceStats, DailyStudentRow};
pub use low::{low_attendance, LowAttendanceRow, LowAttendanceStats};
pub use monthly::{monthly_analytics, AttendanceBand, AttendanceDistribution, MonthlyAnalyticsStats};
pub use semester::{
    academic_year_label, semester_consolidation, ConsolidationRow, SemesterConsolidationStats,
};

/// Minimum overall percentage for exam eligibility; below it a student is
/// flagged for low attendance.
pub const ATTENDANCE_THRESHOLD: f64 = 75.0;

/// Placeholder used when a student's name cannot be resolved.
pub const UNKNOWN_STUDENT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AggregationResult {
    DailyAttendance(DailyAttendanceStats),
    LowAttendance(LowAttendanceStats),
    MonthlyAnalytics(MonthlyAnalyticsStats),
    SemesterConsolidation(SemesterConsolidationStats),
}

impl AggregationResult {
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::DailyAttendance(_) => ReportKind::DailyAttendance,
            Self::LowAttendance(_) => ReportKind::LowAttendance,
            Self::MonthlyAnalytics(_) => ReportKind::MonthlyAnalytics,
            Self::SemesterConsolidation(_) => ReportKind::SemesterConsolidation,
        }
    }
}

/// Formats `value` with one decimal, rounding ties away from zero
/// (`6.25` becomes `"6.3"`, where `{:.1}` alone would give `"6.2"`).
pub fn one_decimal(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round() / 10.0)
}

/// `part / whole * 100` with one decimal, or `"0"` when `whole` is zero.
pub fn percentage_label(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0".to_string();
    }
    one_decimal(part as f64 / whole as f64 * 100.0)
}

/// Mean with one decimal, or `"0"` for an empty set.
pub fn average_label(values: &[f64]) -> String {
    if values.is_empty() {
        return "0".to_string();
    }
    let sum: f64 = values.iter().sum();
    one_decimal(sum / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_label_handles_empty_population() {
        assert_eq!(percentage_label(0, 0), "0");
        assert_eq!(percentage_label(2, 3), "66.7");
        assert_eq!(percentage_label(3, 3), "100.0");
    }

    #[test]
    fn average_label_rounds_to_one_decimal() {
        assert_eq!(average_label(&[]), "0");
        assert_eq!(average_label(&[80.0, 70.0, 65.5]), "71.8");
    }

    #[test]
    fn ties_round_up() {
        assert_eq!(percentage_label(1, 16), "6.3");
        assert_eq!(percentage_label(5, 16), "31.3");
        assert_eq!(average_label(&[72.5, 72.0]), "72.3");
        assert_eq!(one_decimal(72.25), "72.3");
        assert_eq!(one_decimal(0.0), "0.0");
    }
}
