//! # Observability
//!
//! Logging setup for the message relay workspace.
//!
//! Binaries call `observability::init()` or `init_with_config()` once at
//! startup and then use plain `tracing` macros. Library crates never touch
//! the subscriber; they only emit events.
//!
//! Two output formats are supported:
//!
//! - **Compact**: human-readable lines on stderr
//! - **Json**: one JSON object per line appended to a log file, optionally
//!   mirrored to stderr in compact form
//!
//! The JSONL file can be followed with `tail -f <path> | jq`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() -> std::io::Result<()> {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "message-relay".into(),
//!         default_level: "debug".into(),
//!         format: observability::LogFormat::Json,
//!         also_stderr: true,
//!         ..Default::default()
//!     })?;
//!
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogLine};
pub use writer::{default_log_path, LogFileWriter};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines on stderr.
    #[default]
    Compact,
    /// JSONL appended to `log_path`.
    Json,
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info", "message_relay=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// JSONL file for [`LogFormat::Json`].
    /// Defaults to [`default_log_path`] for the service.
    pub log_path: Option<PathBuf>,

    /// Mirror JSON output to stderr in compact form.
    pub also_stderr: bool,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// The file JSON output goes to.
    pub fn resolved_log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| default_log_path(&self.service_name))
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// Initialize compact logging for `service_name` at the default level.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Fails if the log file cannot be opened or a global subscriber is
/// already installed.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    match config.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(stderr_layer().with_filter(config.env_filter()))
            .try_init()
            .map_err(already_installed),
        LogFormat::Json => {
            let log_path = config.resolved_log_path();
            let writer = LogFileWriter::open(&log_path)?;
            let json_layer = JsonLayer::new(config.service_name.clone(), writer);

            let mirror = config
                .also_stderr
                .then(|| stderr_layer().with_filter(config.env_filter()));

            tracing_subscriber::registry()
                .with(json_layer.with_filter(config.env_filter()))
                .with(mirror)
                .try_init()
                .map_err(already_installed)?;

            tracing::info!(log_path = %log_path.display(), "observability initialized");
            Ok(())
        }
    }
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(io::stderr)
}

fn already_installed(err: tracing_subscriber::util::TryInitError) -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, err)
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_resolved_log_path_prefers_explicit() {
        let config = LogConfig {
            service_name: "message-relay".into(),
            log_path: Some(PathBuf::from("/tmp/relay.jsonl")),
            ..Default::default()
        };
        assert_eq!(config.resolved_log_path(), PathBuf::from("/tmp/relay.jsonl"));

        let config = LogConfig {
            service_name: "message-relay".into(),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_log_path(),
            default_log_path("message-relay")
        );
    }
}
