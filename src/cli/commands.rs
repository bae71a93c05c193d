//! Command implementations for the meter-import CLI
//!
//! This module contains the import run itself, progress reporting and the
//! final human or JSON report.

use crate::cli::args::Args;
use crate::cli::input::collect_input_files;
use crate::error::ImportError;
use crate::pipeline::{BatchReport, FileOutcome, ImportPipeline, Outcome};
use crate::store::InMemoryStore;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Main command runner for meter-import
///
/// 1. Validate arguments and expand the input paths
/// 2. Load the store snapshot (unless running in memory)
/// 3. Import every file, one at a time, stopping early on cancellation
/// 4. Save the snapshot and print the report
pub async fn run(args: Args, cancellation: CancellationToken) -> Result<BatchReport> {
    let start_time = Instant::now();
    debug!("Command line arguments: {:?}", args);

    args.validate()?;
    let config = args.to_config();
    let files = collect_input_files(&args.paths)?;
    info!("Importing {} files", files.len());

    let store = match &config.state_path {
        Some(path) => {
            info!("Using store snapshot {}", path.display());
            InMemoryStore::load_snapshot(path)
                .with_context(|| format!("Failed to load store snapshot {}", path.display()))?
        }
        None => InMemoryStore::new(),
    };

    let progress_bar = if config.show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let state_path = config.state_path.clone();
    let pipeline = ImportPipeline::new(&store, config).with_cancellation(cancellation);
    let mut report = BatchReport::default();

    for path in &files {
        let filename = display_name(path);
        if let Some(pb) = &progress_bar {
            pb.set_message(filename.clone());
        }

        let outcome = if pipeline.is_cancelled() {
            FileOutcome::cancelled(&filename)
        } else {
            match tokio::fs::read(path).await {
                Ok(bytes) => pipeline.import_file(&filename, &bytes),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    FileOutcome::failed(&filename, ImportError::from(e).to_string())
                }
            }
        };
        report.push(outcome);

        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = &progress_bar {
        pb.finish_with_message("Import complete");
    }

    if let Some(path) = &state_path {
        save_state(&store, path)?;
    }

    if args.json {
        print_json_report(&report)?;
    } else if !args.quiet {
        print_human_report(&report, start_time.elapsed());
    }

    Ok(report)
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("meter_import={}", log_level)));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();

    if initialized.is_ok() {
        debug!("Logging initialized at level: {}", log_level);
    }
}

/// File name recorded on the flow file, falling back to the full path
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn save_state(store: &InMemoryStore, path: &Path) -> Result<()> {
    store
        .save_snapshot(path)
        .with_context(|| format!("Failed to save store snapshot {}", path.display()))?;
    info!("Store snapshot saved to {}", path.display());
    Ok(())
}

/// Print one line per file and the batch summary
fn print_human_report(report: &BatchReport, elapsed: Duration) {
    println!();
    for outcome in &report.outcomes {
        let label = match outcome.outcome {
            Outcome::Imported => outcome.outcome.to_string().green(),
            Outcome::SkippedDuplicate => outcome.outcome.to_string().yellow(),
            Outcome::Error => outcome.outcome.to_string().red().bold(),
        };
        let format = outcome
            .detected_format
            .map(|format| format.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {} {} {}",
            label,
            outcome.filename.bright_cyan(),
            format!("[{}]", format).bright_black()
        );

        match outcome.outcome {
            Outcome::Imported => println!(
                "      {} records, {} meters created, {} readings created, {} already present, {} repeated in file",
                outcome.records_processed,
                outcome.meters_created,
                outcome.readings_created,
                outcome.readings_already_present,
                outcome.duplicates_in_file
            ),
            Outcome::SkippedDuplicate => {
                if let Some(id) = outcome.flow_file_id {
                    println!("      identical to flow file {}", id);
                }
            }
            Outcome::Error => {
                if let Some(message) = &outcome.error_message {
                    println!("      {}", message.red());
                }
            }
        }

        if !outcome.warnings.is_empty() {
            println!(
                "      {}",
                format!("{} warnings", outcome.warnings.len()).yellow()
            );
            for warning in &outcome.warnings {
                debug!("{}: {}", outcome.filename, warning);
            }
        }
    }

    let summary = &report.summary;
    println!();
    println!("{}", "Import summary".bright_green().bold());
    println!("   Total:      {}", summary.total);
    println!("   Successful: {}", summary.successful.to_string().green());
    println!("   Skipped:    {}", summary.skipped.to_string().yellow());
    println!("   Errors:     {}", summary.errors.to_string().red());
    println!("   Success rate: {:.1}%", summary.success_rate());
    println!("   Elapsed:    {}", HumanDuration(elapsed));
    println!();
}

/// Print the full report for machine consumption
fn print_json_report(report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
