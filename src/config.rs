use std::time::Duration;

use crate::batch::BatchOptions;
use crate::error::{ReportError, ReportResult};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub run_timeout: Duration,
    pub io_timeout: Duration,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> ReportResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ReportResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ReportError::config("DATABASE_URL must be set to a production Postgres instance")
            })?;

        Ok(Self {
            database_url,
            max_connections: parse_or(
                &lookup,
                "REPORT_DB_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            run_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REPORT_RUN_TIMEOUT_SECS",
                DEFAULT_RUN_TIMEOUT_SECS,
            )?),
            io_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REPORT_IO_TIMEOUT_SECS",
                DEFAULT_IO_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            run_timeout: self.run_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ReportResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ReportError::config(format!("{key} has invalid value {raw:?}"))),
        None => Ok(default),
    }
}
