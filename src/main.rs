use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use campus_report_scheduler::config::Config;
use campus_report_scheduler::db::{self, PgStore};
use campus_report_scheduler::{logging, BatchProcessor};

/// Exit status for a run aborted before any report was processed.
const RUN_FAILED: u8 = 2;
/// Exit status for a run that hit its deadline with reports still due.
const RUN_INCOMPLETE: u8 = 3;

#[derive(Parser)]
#[command(name = "campus-report-scheduler")]
#[command(about = "Scheduled attendance report generation for Campus Sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import students and attendance from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List report schedules that are due now
    Due {
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Generate and queue every due report
    Process {
        #[arg(long)]
        frequency: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init().context("failed to initialise logging")?;

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.io_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAttendance { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} attendance rows from {}.", csv.display());
        }
        Commands::Due { frequency } => {
            let processor = BatchProcessor::new(PgStore::new(pool), config.batch_options());
            let due = processor
                .due_definitions(frequency.as_deref(), Utc::now())
                .await?;

            if due.is_empty() {
                println!("No reports due.");
                return Ok(ExitCode::SUCCESS);
            }

            println!("Reports due:");
            for definition in &due {
                println!(
                    "- {} {} for {} ({}, {} recipients)",
                    definition.id,
                    definition.report_type,
                    definition.department,
                    definition.cadence.frequency,
                    definition.recipients.len()
                );
            }
        }
        Commands::Process { frequency } => {
            let processor = BatchProcessor::new(PgStore::new(pool), config.batch_options());
            match processor.process_due_reports(frequency.as_deref()).await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    if !summary.is_complete() {
                        return Ok(ExitCode::from(RUN_INCOMPLETE));
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Report run failed");
                    eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                    let status = if e.is_batch_level() { RUN_FAILED } else { 1 };
                    return Ok(ExitCode::from(status));
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
