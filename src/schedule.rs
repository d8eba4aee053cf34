//! Next-run computation and the scheduler updater.

use chrono::{DateTime, Duration, Months, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::ReportResult;
use crate::models::Cadence;
use crate::store::ReportStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Unrecognised frequencies advance daily, same as the SQL function.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::Daily,
        }
    }

    fn step(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Daily => from + Duration::days(1),
            Self::Weekly => from + Duration::days(7),
            Self::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or_else(|| from + Duration::days(30)),
        }
    }
}

/// First slot at the cadence's time of day that is strictly after `now`.
pub fn next_run_after(cadence: &Cadence, now: DateTime<Utc>) -> DateTime<Utc> {
    let frequency = Frequency::parse(&cadence.frequency);
    let time = NaiveTime::from_hms_opt(cadence.hour.min(23), cadence.minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);

    let mut candidate = now.date_naive().and_time(time).and_utc();
    while candidate <= now {
        candidate = frequency.step(candidate);
    }
    candidate
}

/// Advances a definition's next-eligible run once it has been processed.
pub struct SchedulerUpdater<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ReportStore + ?Sized> SchedulerUpdater<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The store owns the next-run computation; this is called exactly once
    /// per processed definition, whatever its outcome.
    pub async fn advance(&self, definition_id: Uuid, now: DateTime<Utc>) -> ReportResult<()> {
        self.store.advance_schedule(definition_id, now).await?;
        tracing::debug!(report_id = %definition_id, "Advanced next run");
        Ok(())
    }
}
