mod app;
mod campaign;
mod classify;
mod cli;
mod config;
mod controller;
mod countdown;
mod logging;
mod markup;
mod renderer;
mod rowcache;
mod source;
mod table;

use std::time::Instant;

use clap::Parser;

use crate::config::Settings;
use crate::logging::LogTarget;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let target = if cli.once {
        LogTarget::Stderr
    } else {
        match cli.log_file.as_deref() {
            Some(path) => LogTarget::File(path),
            None => LogTarget::Discard,
        }
    };
    logging::init(target, cli.verbose)?;

    let settings = build_settings(&cli)?;
    tracing::info!(
        url = %settings.url,
        threshold = settings.upcoming_threshold,
        tick_ms = settings.tick_interval_ms,
        refresh_ms = settings.refresh_interval_ms,
        "Starting sovwatch"
    );

    let source = source::source_for(&settings.url, settings.fetch_timeout())?;

    // Handle --once mode
    if cli.once {
        return handle_once(&settings, cli.filter, source.as_ref());
    }

    // Normal dashboard mode
    let mut app = app::App::new(&settings, cli.filter, source);
    app.run()?;

    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn build_settings(cli: &cli::Cli) -> anyhow::Result<Settings> {
    let mut settings = match cli.config.as_deref() {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(ref url) = cli.url {
        settings.url = url.clone();
    }
    if let Some(threshold) = cli.threshold {
        settings.upcoming_threshold = threshold;
    }
    if let Some(tick_ms) = cli.tick_ms {
        settings.tick_interval_ms = tick_ms;
    }
    if let Some(refresh_ms) = cli.refresh_ms {
        settings.refresh_interval_ms = refresh_ms;
    }
    if let Some(ref format) = cli.date_format {
        settings.datetime_format = format.clone();
    }

    settings.validate()?;
    Ok(settings)
}

fn handle_once(
    settings: &Settings,
    filter: classify::StatusFilter,
    source: &dyn source::DataSource,
) -> anyhow::Result<()> {
    let Some(rows) = source.fetch()? else {
        anyhow::bail!("{} returned no campaign data", source.describe());
    };

    let mut controller = controller::RefreshController::new(app::build_table(settings), settings);
    controller.set_status_filter(filter);
    controller.startup(Ok(Some(rows)), Instant::now());

    for line in renderer::render_plain(&controller) {
        println!("{}", line);
    }

    Ok(())
}
