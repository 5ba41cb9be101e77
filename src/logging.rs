//! `tracing` subscriber setup.
//!
//! The bot logs to stderr and, when `[logging].dir` is set, to a JSON file
//! rotated daily. CLI subcommands log to stderr only. `RUST_LOG` always
//! overrides the configured level.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated log files.
const LOG_FILE_PREFIX: &str = "doppel.log";

/// Keeps the background log writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Log JSON lines to `{logs_dir}/doppel.log.YYYY-MM-DD` and text to stderr.
///
/// # Errors
///
/// Fails if `logs_dir` cannot be created or a global subscriber is already
/// installed. The directory is created before the subscriber is installed.
pub fn init_production(logs_dir: &Path, level: &str) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let (file_writer, writer_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(tracing_subscriber::fmt::layer().json().with_writer(file_writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LoggingGuard {
        _writer: writer_guard,
    })
}

/// Log text to stderr only. A no-op if a subscriber is already installed.
pub fn init_cli(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .try_init();
}
