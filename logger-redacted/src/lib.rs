//! Logging setup for Quill services
//!
//! - `init` installs the global `tracing` subscriber: `EnvFilter` from the
//!   configured level (overridden by `RUST_LOG`), JSON or human-readable
//!   output, stdout or a file through `tracing-appender`
//! - The returned [`LoggerGuard`] carries a root span with `application`
//!   and `hostname`; request spans created with it as parent inherit both
//! - [`PiiRedactor`] masks emails and IPv4 addresses in values before they
//!   are recorded
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{LogConfig, PiiRedactor};
//! use tracing::info;
//!
//! let guard = logger_redacted::init(&LogConfig::default()).unwrap();
//! let _entered = guard.span().enter();
//!
//! let redactor = PiiRedactor::default();
//! info!(email = %redactor.redact("ada@example.com"), "User logged in");
//! // email="a***@e***"
//! ```

pub mod config;
pub mod redactor;

pub use config::*;
pub use redactor::*;

use std::path::Path;
use thiserror::Error;
use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log level '{0}': {1}")]
    InvalidLevel(String, String),

    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the background writer alive; dropping it flushes pending records.
pub struct LoggerGuard {
    _worker: WorkerGuard,
    span: Span,
}

impl LoggerGuard {
    /// Root span carrying `application` and `hostname`
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Host name from the environment, `unknown` when unset
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Install the global subscriber described by `config`
pub fn init(config: &LogConfig) -> Result<LoggerGuard, LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggerError::InvalidLevel(config.level.clone(), e.to_string()))?,
    };

    let (writer, worker) = match config.file {
        Some(ref file) => {
            let path = Path::new(file);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggerError::InvalidPath(file.clone()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_file(config.add_source)
            .with_line_number(config.add_source)
            .with_writer(writer.clone())
    });
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(config.file.is_none())
            .with_file(config.add_source)
            .with_line_number(config.add_source)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

    let host = hostname();
    let span = tracing::info_span!("service", application = %config.application, hostname = %host);
    tracing::info!(
        parent: &span,
        level = %config.level,
        json = config.json,
        file = config.file.as_deref().unwrap_or("stdout"),
        "Logging initialized"
    );

    Ok(LoggerGuard { _worker: worker, span })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.application, "quill");
        assert_eq!(config.level, "info");
        assert!(config.json);
        assert!(!config.add_source);
    }

    #[test]
    fn test_hostname_never_empty() {
        assert!(!hostname().is_empty());
    }
}
