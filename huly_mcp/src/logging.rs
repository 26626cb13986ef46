//! Tracing setup. Stdout carries the protocol, so logs go to stderr or a file.
use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file path has no file name: {0}")]
    InvalidFile(String),

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// `RUST_LOG` wins over the configured level when set.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive until
/// the process exits.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(&config.level);

    match &config.file {
        Some(file) => {
            let (directory, file_name) = split_log_path(file)?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(None)
        }
    }
}

fn split_log_path(file: &Path) -> Result<(&Path, &std::ffi::OsStr), LoggingError> {
    let file_name = file
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(file.display().to_string()))?;
    let directory = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((directory, file_name))
}
