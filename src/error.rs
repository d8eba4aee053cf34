//! Error types for report processing.

use std::time::Duration;

use thiserror::Error;

/// Result type for report processing.
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Unknown report type: {0}")]
    UnknownReportKind(String),

    #[error("Data access error: {0}")]
    DataAccess(String),

    #[error("Render error: {0}")]
    Render(String),

    /// The due set could not be fetched. Aborts the whole run.
    #[error("Failed to fetch due reports: {0}")]
    DueSetFetch(String),

    #[error("Report run exceeded {0:?}")]
    RunTimeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ReportError {
    pub fn data_access(msg: impl Into<String>) -> Self {
        Self::DataAccess(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error ends the run instead of a single item.
    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            Self::DueSetFetch(_) | Self::RunTimeout(_) | Self::Configuration(_)
        )
    }
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        Self::DataAccess(err.to_string())
    }
}
