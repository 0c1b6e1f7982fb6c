//! Logging bootstrap for the command line tool.
//!
//! Console output goes to stderr so the tables printed on stdout stay
//! clean; the same events are written without ANSI colors to a rolling
//! log file in the configured log directory.

use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogRotation};
use crate::error::{PublishError, Result};

impl LogRotation {
    pub fn rotation(self) -> Rotation {
        match self {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Path of the active log file, before any rotation suffix
pub fn log_file(config: &Config) -> PathBuf {
    config.log_dir().join(&config.logging.file_name)
}

/// Filter directive applied when `RUST_LOG` is not set
pub fn default_directive(config: &Config, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// Install the console and file subscribers.
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the program exits.
pub fn init(config: &Config, verbose: bool) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| PublishError::io(&log_dir, e))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(config.logging.rotation.rotation())
        .filename_prefix(config.logging.file_name.as_str())
        .build(&log_dir)
        .map_err(|e| PublishError::Config(format!("Failed to open log file in {}: {}", log_dir.display(), e)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let directive = default_directive(config, verbose);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directive).map_err(|e| {
            PublishError::Config(format!("Invalid log level '{}': {}", directive, e))
        })?,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PublishError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(
        "Logging initialized - level: {}, file: {} ({:?} rotation)",
        directive,
        log_file(config).display(),
        config.logging.rotation
    );

    Ok(guard)
}
