use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use super::average_label;
use crate::models::{ReportScope, StudentSummary};

/// Half-open attendance bands: `>=90`, `[75,90)`, `[60,75)`, `<60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceBand {
    Excellent,
    Good,
    Average,
    Poor,
}

impl AttendanceBand {
    pub fn classify(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Excellent
        } else if percentage >= 75.0 {
            Self::Good
        } else if percentage >= 60.0 {
            Self::Average
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent (≥90%)",
            Self::Good => "Good (75-90%)",
            Self::Average => "Average (60-75%)",
            Self::Poor => "Poor (<60%)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDistribution {
    pub above_90: usize,
    pub between_75_and_90: usize,
    pub between_60_and_75: usize,
    pub below_60: usize,
}

impl AttendanceDistribution {
    pub fn record(&mut self, percentage: f64) {
        match AttendanceBand::classify(percentage) {
            AttendanceBand::Excellent => self.above_90 += 1,
            AttendanceBand::Good => self.between_75_and_90 += 1,
            AttendanceBand::Average => self.between_60_and_75 += 1,
            AttendanceBand::Poor => self.below_60 += 1,
        }
    }

    pub fn count(&self, band: AttendanceBand) -> usize {
        match band {
            AttendanceBand::Excellent => self.above_90,
            AttendanceBand::Good => self.between_75_and_90,
            AttendanceBand::Average => self.between_60_and_75,
            AttendanceBand::Poor => self.below_60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAnalyticsStats {
    pub department: String,
    pub semester: Option<i32>,
    pub month: String,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub total_students: usize,
    pub avg_percentage: String,
    #[serde(flatten)]
    pub distribution: AttendanceDistribution,
}

pub fn monthly_analytics(
    scope: &ReportScope,
    today: NaiveDate,
    summaries: &[StudentSummary],
) -> MonthlyAnalyticsStats {
    let percentages: Vec<f64> = summaries.iter().map(|s| s.overall_percentage).collect();

    let mut distribution = AttendanceDistribution::default();
    for percentage in &percentages {
        distribution.record(*percentage);
    }

    let month_start = today - Duration::days(i64::from(today.day0()));
    let month_end = month_start + Months::new(1) - Duration::days(1);

    MonthlyAnalyticsStats {
        department: scope.department.clone(),
        semester: scope.semester,
        month: today.format("%B %Y").to_string(),
        month_start,
        month_end,
        total_students: percentages.len(),
        avg_percentage: average_label(&percentages),
        distribution,
    }
}
