//! Telemetry and tracing utilities
//!
//! The crate itself only emits `tracing` events (target `courier::http` for
//! the request path). This module is the optional convenience for
//! applications that want a ready-made subscriber, configured from the
//! `[log]` table of `courier.toml` or from `COURIER_LOG_*` variables.
//!
//! ## Example
//!
//! ```rust,no_run
//! use courier::telemetry::{LogConfig, LogLevel, OutputFormat, init_subscriber};
//!
//! let config = LogConfig::default()
//!     .with_level(LogLevel::Debug)
//!     .with_format(OutputFormat::Json);
//! let _guard = init_subscriber(&config)?;
//! # Ok::<(), courier::CourierError>(())
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::{CourierError, Result};

/// Prefix of the variables read by [`config_from_env`].
pub const LOG_ENV_PREFIX: &str = "COURIER_LOG_";

/// Verbosity of the `courier` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON, one object per line
    Json,
    /// JSON without span lists
    JsonCompact,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: OutputFormat,
    /// Write to stderr when no log file is set.
    pub console: bool,
    /// Log file; takes precedence over the console.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: OutputFormat::Text,
            console: true,
            file: None,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Filter directive applied by [`init_subscriber`].
    pub fn filter_directive(&self) -> String {
        format!("courier={}", self.level.as_directive())
    }
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard)> {
    let file_name = path.file_name().ok_or_else(|| {
        CourierError::Configuration(format!("Log file path has no file name: {}", path.display()))
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    Ok((BoxMakeWriter::new(writer), guard))
}

/// Install a global tracing subscriber.
///
/// Returns the file writer's guard when `file` is set; keep it alive for as
/// long as logs should be flushed. A subscriber that is already installed is
/// left in place and is not an error.
pub fn init_subscriber(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(config.filter_directive())
        .map_err(|e| CourierError::Configuration(format!("Invalid log filter: {e}")))?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (writer, Some(guard))
        }
        None if config.console => (BoxMakeWriter::new(std::io::stderr), None),
        None => (BoxMakeWriter::new(std::io::sink), None),
    };

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);
    let installed = match config.format {
        OutputFormat::Text => fmt.try_init(),
        OutputFormat::Json => fmt.json().try_init(),
        OutputFormat::JsonCompact => fmt.json().flatten_event(true).with_span_list(false).try_init(),
    };

    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
    Ok(guard)
}

/// Read a [`LogConfig`] from `COURIER_LOG_LEVEL`, `COURIER_LOG_FORMAT`,
/// `COURIER_LOG_CONSOLE` and `COURIER_LOG_FILE`.
pub fn config_from_env() -> Result<LogConfig> {
    Ok(Figment::from(Serialized::defaults(LogConfig::default()))
        .merge(Env::prefixed(LOG_ENV_PREFIX))
        .extract()?)
}

/// [`init_subscriber`] with [`config_from_env`].
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(&config_from_env()?)
}
