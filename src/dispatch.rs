//! Maps a definition's report kind to its aggregator.

use chrono::NaiveDate;

use crate::aggregate::{self, low, AggregationResult};
use crate::error::ReportResult;
use crate::models::{ReportKind, ScheduledReportDefinition};
use crate::store::ReportStore;

/// Fetches the rows a report kind needs and runs its aggregator.
///
/// Fails with `UnknownReportKind` for unrecognised tags and `DataAccess` when
/// a query fails; empty data yields zero-valued statistics.
pub async fn dispatch<S: ReportStore + ?Sized>(
    store: &S,
    definition: &ScheduledReportDefinition,
    today: NaiveDate,
) -> ReportResult<AggregationResult> {
    let kind = ReportKind::parse(&definition.report_type)?;
    let scope = definition.scope();

    let result = match kind {
        ReportKind::DailyAttendance => {
            let records = store
                .query_attendance(&scope.without_section(), today)
                .await?;
            AggregationResult::DailyAttendance(aggregate::daily_attendance(
                &scope, today, &records,
            ))
        }
        ReportKind::LowAttendance => {
            let summaries = store
                .query_attendance_summary(&scope.without_section())
                .await?;
            let names = store
                .lookup_student_names(&low::flagged_ids(&summaries))
                .await?;
            AggregationResult::LowAttendance(aggregate::low_attendance(&scope, &summaries, &names))
        }
        ReportKind::MonthlyAnalytics => {
            let summaries = store
                .query_attendance_summary(&scope.without_section())
                .await?;
            AggregationResult::MonthlyAnalytics(aggregate::monthly_analytics(
                &scope, today, &summaries,
            ))
        }
        ReportKind::SemesterConsolidation => {
            let summaries = store.query_attendance_summary(&scope).await?;
            let ids: Vec<String> = summaries
                .iter()
                .map(|s| s.registration_no.clone())
                .collect();
            let names = store.lookup_student_names(&ids).await?;
            AggregationResult::SemesterConsolidation(aggregate::semester_consolidation(
                &scope, today, &summaries, &names,
            ))
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::memory::InMemoryStore;
    use crate::models::{Cadence, StudentProfile};
    use chrono::Utc;
    use uuid::Uuid;

    fn definition(report_type: &str, department: &str) -> ScheduledReportDefinition {
        ScheduledReportDefinition {
            id: Uuid::new_v4(),
            report_type: report_type.to_string(),
            department: department.to_string(),
            semester: None,
            section: Some("A".to_string()),
            recipients: vec![],
            cadence: Cadence {
                frequency: "daily".to_string(),
                hour: 8,
                minute: 0,
            },
            enabled: true,
            next_run: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (reg, section, presence) in [
            ("R1", "A", [true, true]),
            ("R2", "B", [true, false]),
            ("R3", "A", [false, false]),
        ] {
            store.add_student(StudentProfile {
                registration_no: reg.to_string(),
                student_name: format!("Student {reg}"),
                department: "Computer Science".to_string(),
                semester: Some(5),
                section: Some(section.to_string()),
            });
            for (period, present) in presence.into_iter().enumerate() {
                store.record_attendance(reg, today(), period as i32 + 1, present);
            }
        }
        store
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_before_any_query() {
        let store = InMemoryStore::new();
        store.fail_queries_for("CSE");
        let err = dispatch(&store, &definition("yearlyDigest", "CSE"), today())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::UnknownReportKind(tag) if tag == "yearlyDigest"));
    }

    #[tokio::test]
    async fn daily_report_ignores_section_filter() {
        let store = seeded_store();
        let result = dispatch(&store, &definition("dailyAttendance", "computer"), today())
            .await
            .unwrap();

        let AggregationResult::DailyAttendance(stats) = result else {
            panic!("expected daily stats");
        };
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.present_count, 2);
        assert_eq!(stats.absent_count, 1);
        assert_eq!(stats.percentage, "66.7");
    }

    #[tokio::test]
    async fn consolidation_applies_section_and_batches_names() {
        let store = seeded_store();
        let result = dispatch(
            &store,
            &definition("semesterConsolidation", "Computer Science"),
            today(),
        )
        .await
        .unwrap();

        let AggregationResult::SemesterConsolidation(stats) = result else {
            panic!("expected consolidation stats");
        };
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.eligible, 1);
        assert_eq!(stats.students[0].student_name, "Student R1");
        assert_eq!(store.name_lookups(), 1);
    }

    #[tokio::test]
    async fn low_attendance_resolves_names_once() {
        let store = seeded_store();
        let result = dispatch(&store, &definition("weeklyLowAttendance", "Computer"), today())
            .await
            .unwrap();

        let AggregationResult::LowAttendance(stats) = result else {
            panic!("expected low attendance stats");
        };
        let order: Vec<&str> = stats
            .students
            .iter()
            .map(|s| s.student_name.as_str())
            .collect();
        assert_eq!(order, vec!["Student R3", "Student R2"]);
        assert_eq!(store.name_lookups(), 1);
    }

    #[tokio::test]
    async fn query_failure_is_data_access_error() {
        let store = seeded_store();
        store.fail_queries_for("Computer Science");
        let err = dispatch(&store, &definition("monthlyAnalytics", "Computer Science"), today())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::DataAccess(_)));
    }
}
