//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (RUST_LOG wins,
//! otherwise the configured level), an optional console layer on stderr, and a
//! non-blocking daily-rolling file layer.
//!
//! stdout is left alone so the binary can print JSON results on it.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::LoggingConfig;

/// Directory for log files: the configured one, else the platform data dir.
pub fn log_directory(config: &LoggingConfig) -> Option<PathBuf> {
    match &config.directory {
        Some(dir) => Some(PathBuf::from(dir)),
        None => dirs::data_local_dir().map(|d| d.join("deckhand").join("logs")),
    }
}

/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let (file_layer, guard) = match log_directory(config) {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, &config.file);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = config
        .console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_directory_wins() {
        let config = LoggingConfig {
            directory: Some("/var/tmp/deckhand-logs".to_string()),
            ..LoggingConfig::default()
        };
        assert_eq!(
            log_directory(&config),
            Some(PathBuf::from("/var/tmp/deckhand-logs"))
        );
    }

    #[test]
    fn test_default_directory_is_namespaced() {
        let config = LoggingConfig::default();
        if let Some(dir) = log_directory(&config) {
            assert!(dir.ends_with("deckhand/logs"));
        }
    }
}
