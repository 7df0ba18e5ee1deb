use clap::Parser;
use std::path::PathBuf;

use crate::classify::StatusFilter;

/// Live sovereignty campaign countdowns in the terminal
#[derive(Parser, Debug)]
#[command(name = "sovwatch")]
#[command(version)]
#[command(about = "Live sovereignty campaign countdowns in the terminal")]
pub struct Cli {
    /// Campaign endpoint (http/https URL, file:// URL or path to a JSON file)
    pub url: Option<String>,

    /// JSON file with settings overrides
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Seconds before start at which an inactive campaign counts as upcoming
    #[arg(short = 't', long = "threshold")]
    pub threshold: Option<i64>,

    /// Countdown tick interval in milliseconds
    #[arg(long = "tick-ms")]
    pub tick_ms: Option<u64>,

    /// Data refresh interval in milliseconds
    #[arg(short = 'r', long = "refresh-ms")]
    pub refresh_ms: Option<u64>,

    /// Start time format (chrono strftime syntax, UTC)
    #[arg(long = "date-format")]
    pub date_format: Option<String>,

    /// Initial status filter: all, active or upcoming
    #[arg(short = 'f', long = "filter", default_value = "all")]
    pub filter: StatusFilter,

    /// Print one snapshot of the table and exit
    #[arg(long = "once")]
    pub once: bool,

    /// Write logs to this file (the dashboard itself never logs to the terminal)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sovwatch"]).unwrap();
        assert_eq!(cli.url, None);
        assert_eq!(cli.filter, StatusFilter::All);
        assert!(!cli.once);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "sovwatch",
            "https://auth.example.com/sovtimer/data/",
            "-t",
            "3600",
            "--refresh-ms",
            "10000",
            "--filter",
            "upcoming",
            "--once",
            "-vv",
        ])
        .unwrap();
        assert_eq!(
            cli.url.as_deref(),
            Some("https://auth.example.com/sovtimer/data/")
        );
        assert_eq!(cli.threshold, Some(3600));
        assert_eq!(cli.refresh_ms, Some(10_000));
        assert_eq!(cli.filter, StatusFilter::Upcoming);
        assert!(cli.once);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        assert!(Cli::try_parse_from(["sovwatch", "--filter", "soon"]).is_err());
    }
}
