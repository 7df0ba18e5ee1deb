//! Diagnostic logging.
//!
//! The terminal belongs to the dashboard while it runs, so in TUI mode logs
//! only go to a file (when one is given). Snapshot mode logs to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Where log lines end up.
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
    Discard,
}

/// Default filter for a `-v` count. `RUST_LOG` always wins.
fn default_filter(verbosity: u8) -> String {
    let (global, local) = match verbosity {
        0 => ("warn", "info"),
        1 => ("warn", "debug"),
        _ => ("info", "trace"),
    };
    format!("{},{}={}", global, env!("CARGO_CRATE_NAME"), local)
}

/// Install the global tracing subscriber.
pub fn init(target: LogTarget<'_>, verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match target {
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::Discard => builder.with_writer(std::io::sink).try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}
