//! Command-line argument definitions for the meter reading importer
//!
//! This module defines the CLI interface using the clap derive API and
//! turns the parsed arguments into an `ImportConfig`.

use crate::config::ImportConfig;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the meter reading importer
///
/// Imports D0010/UFF flows and tabular meter reading exports into the
/// local store, skipping files whose exact bytes were imported before.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "meter-import",
    version,
    about = "Import UK D0010/UFF flows and meter reading exports",
    long_about = "Imports meter readings from D0010/UFF flows (strict ZHD and lenient ZHV \
                  layouts), CSV, JSON, XML and plain-text exports, and PDF containers \
                  wrapping any of those. Each file is checksummed first, so re-running \
                  over the same inputs never imports a file twice."
)]
pub struct Args {
    /// Files, directories (searched recursively) or glob patterns to import
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<String>,

    /// Store snapshot to load before and save after the import
    ///
    /// Defaults to <data_dir>/meter-import/state.json.
    #[arg(
        long = "state",
        value_name = "PATH",
        help = "Store snapshot to load and update"
    )]
    pub state: Option<PathBuf>,

    /// Keep the store in memory only
    #[arg(
        long = "no-state",
        conflicts_with = "state",
        help = "Do not load or save a store snapshot"
    )]
    pub no_state: bool,

    /// Date given to readings that carry none (defaults to today)
    #[arg(
        long = "processing-date",
        value_name = "YYYY-MM-DD",
        value_parser = parse_processing_date,
        help = "Date for readings without one"
    )]
    pub processing_date: Option<NaiveDate>,

    /// Register id given to readings that carry none
    #[arg(
        long = "register-id",
        value_name = "ID",
        help = "Register id for readings without one"
    )]
    pub register_id: Option<String>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Print the per-file outcomes as JSON instead of a summary
    #[arg(long = "json", help = "Print outcomes as JSON")]
    pub json: bool,
}

fn parse_processing_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", value, e))
}

impl Args {
    /// Validate the arguments for consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(register_id) = &self.register_id {
            if register_id.trim().is_empty() {
                anyhow::bail!("Register id cannot be empty");
            }
        }

        if let Some(state) = &self.state {
            if state.is_dir() {
                anyhow::bail!("State path is a directory: {}", state.display());
            }
        }

        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are hidden in quiet and JSON modes
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Snapshot location, or `None` for an in-memory run
    pub fn state_path(&self) -> Option<PathBuf> {
        if self.no_state {
            return None;
        }
        self.state
            .clone()
            .or_else(ImportConfig::default_state_path)
    }

    /// Build the import configuration from the arguments
    pub fn to_config(&self) -> ImportConfig {
        let mut config = ImportConfig::default();
        if let Some(date) = self.processing_date {
            config = config.with_processing_date(date);
        }
        if let Some(register_id) = &self.register_id {
            config = config.with_default_register_id(register_id.trim());
        }
        if let Some(path) = self.state_path() {
            config = config.with_state_path(path);
        }
        if !self.show_progress() {
            config = config.without_progress();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("meter-import").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_paths_are_required() {
        assert!(Args::try_parse_from(["meter-import"]).is_err());
        assert_eq!(parse(&["a.uff", "dir"]).paths, vec!["a.uff", "dir"]);
    }

    #[test]
    fn test_state_flags() {
        let args = parse(&["--state", "/tmp/state.json", "a.uff"]);
        assert_eq!(args.state_path(), Some(PathBuf::from("/tmp/state.json")));

        let args = parse(&["--no-state", "a.uff"]);
        assert_eq!(args.state_path(), None);
        assert!(args.to_config().state_path.is_none());

        assert!(
            Args::try_parse_from(["meter-import", "--state", "s.json", "--no-state", "a.uff"])
                .is_err()
        );
    }

    #[test]
    fn test_processing_date_parsing() {
        let args = parse(&["--processing-date", "2025-01-31", "a.uff"]);
        assert_eq!(args.processing_date, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(
            args.to_config().effective_processing_date(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );

        assert!(Args::try_parse_from(["meter-import", "--processing-date", "31/01/2025", "a"]).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["a"]).get_log_level(), "warn");
        assert_eq!(parse(&["-v", "a"]).get_log_level(), "info");
        assert_eq!(parse(&["-vv", "a"]).get_log_level(), "debug");
        assert_eq!(parse(&["-vvvv", "a"]).get_log_level(), "trace");
        assert_eq!(parse(&["-q", "a"]).get_log_level(), "error");
        assert!(Args::try_parse_from(["meter-import", "-q", "-v", "a"]).is_err());
    }

    #[test]
    fn test_to_config() {
        let args = parse(&["--register-id", " S ", "--json", "--no-state", "a"]);
        let config = args.to_config();
        assert_eq!(config.default_register_id, "S");
        assert!(!config.show_progress);
        assert!(config.processing_date.is_none());
    }

    #[test]
    fn test_validation() {
        assert!(parse(&["a"]).validate().is_ok());
        assert!(parse(&["--register-id", "  ", "a"]).validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        let state = temp_dir.path().to_string_lossy().to_string();
        assert!(parse(&["--state", &state, "a"]).validate().is_err());
    }
}
