//! Scheduled attendance report generation.
//!
//! A run selects due report definitions, aggregates attendance statistics per
//! report kind, renders them, queues one email per recipient and advances
//! each definition's next run.

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod memory;
pub mod models;
pub mod report;
pub mod schedule;
pub mod store;

pub use batch::{BatchOptions, BatchProcessor};
pub use error::{ReportError, ReportResult};
pub use store::ReportStore;
