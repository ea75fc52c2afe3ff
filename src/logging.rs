//! Logging setup with a console layer and a durable per-run log file.
//!
//! The console follows the `-v`/`-q` flags. The file `log-{run_id}` in the
//! configured log directory always receives this crate's DEBUG output, is
//! appended to across resumed invocations, and is written from a background
//! thread.

use crate::state::RunId;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Name of the log file for a run
pub fn log_file_name(run_id: &RunId) -> String {
    format!("log-{}", run_id)
}

/// Console filter for the given verbosity flags
pub fn console_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        // Only show errors
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::new("obit_crawl=info,warn"),
        1 => EnvFilter::new("obit_crawl=debug,info"),
        2 => EnvFilter::new("obit_crawl=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the program exits.
///
/// # Errors
///
/// Fails if the log directory or file cannot be created, or if a global
/// subscriber is already installed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    log_dir: &Path,
    run_id: &RunId,
) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(log_file_name(run_id))
        .build(log_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new("obit_crawl=debug,info"));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(console_filter(verbose, quiet));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    tracing::debug!(
        "Logging to {}",
        log_dir.join(log_file_name(run_id)).display()
    );

    Ok(guard)
}
