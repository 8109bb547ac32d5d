//! CLI entry point for reelfetch.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use reelfetch_core::{Harvester, LogProgress, ProgressReporter, split_source_urls};
use tracing::{debug, error, info, warn};

mod app;
mod cli;
mod config;

use app::exit_handler::{ProcessExit, determine_exit_outcome};
use app::terminal_progress::TerminalProgress;
use cli::Args;
use config::{RunSettings, load_file_config, merge_settings};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let file_config = load_file_config(args.config.as_deref())?;
    let mut settings = merge_settings(&args, file_config.as_ref());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!("Reelfetch starting");

    if settings.urls.is_empty() {
        settings.urls = read_urls_from_stdin()?;
    }
    if settings.urls.is_empty() {
        bail!(
            "no source URLs given; pass them as arguments, pipe them via stdin, \
             or set `start_urls` in the config file"
        );
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(Arc::clone(&interrupted));

    let reporter = progress_reporter(&settings);
    let harvester = Harvester::new(&settings.harvest, reporter, interrupted)
        .context("Failed to initialise downloader")?;

    let report = harvester
        .run(&settings.urls)
        .await
        .context("Download run failed")?;

    println!("{report}");

    if let Some(path) = &settings.summary_json {
        let json = report.to_json().context("Failed to serialise summary")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write summary JSON to '{}'", path.display()))?;
        info!(path = %path.display(), "summary JSON written");
    }

    Ok(determine_exit_outcome(&report))
}

fn read_urls_from_stdin() -> Result<Vec<String>> {
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read source URLs from stdin")?;
    Ok(buffer.lines().flat_map(split_source_urls).collect())
}

fn progress_reporter(settings: &RunSettings) -> Arc<dyn ProgressReporter> {
    if settings.show_progress && io::stderr().is_terminal() {
        Arc::new(TerminalProgress::new())
    } else {
        Arc::new(LogProgress)
    }
}

/// First Ctrl+C stops after the current download; a second one exits at once.
fn spawn_interrupt_listener(interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; finishing the current download. Press Ctrl+C again to abort.");
        interrupted.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted.");
            std::process::exit(i32::from(ProcessExit::Interrupted.code()));
        }
    });
}
