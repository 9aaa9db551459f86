//! dirtally - Parallel filesystem accounting
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use dirtally::config::{CliArgs, WalkConfig};
use dirtally::tree::{assemble, write_report};
use dirtally::users::UserTable;
use dirtally::walker::WalkCoordinator;
use humansize::{format_size, BINARY};
use std::io::Write;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    // The barrier is the only clean shutdown path; an interrupt just
    // aborts the process.
    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted");
        std::process::exit(1);
    })
    .context("Failed to set signal handler")?;

    let report_config = config.clone();
    let traversal = WalkCoordinator::new(config).run().context("Walk failed")?;

    let index = assemble(traversal.results);
    let rows = index.collect_rows(&traversal.roots, &report_config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &rows, &report_config, &mut UserTable::new())
        .context("Failed to write report")?;
    out.flush().context("Failed to write report")?;

    let stats = &traversal.stats;
    info!(
        dirs = stats.dirs,
        entries = stats.files,
        size = %format_size(stats.bytes, BINARY),
        errors = stats.errors,
        skipped = stats.skipped,
        secs = format!("{:.1}", stats.duration.as_secs_f64()),
        "run summary"
    );

    // Partial results were printed above; a dead worker still fails the
    // run.
    for e in &traversal.worker_errors {
        eprintln!("Error: {e:#}");
    }
    Ok(traversal.worker_errors.is_empty())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("dirtally=info,warn")
    } else {
        EnvFilter::new("dirtally=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}
