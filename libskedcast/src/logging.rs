//! Logging setup shared by the Skedcast binaries
//!
//! Output goes to stderr in one of three formats. Publish spans carry
//! `post_id` and `platform` fields so a JSON log line can be joined back to
//! the row it describes. Access and refresh tokens are never logged.
//!
//! ```no_run
//! use libskedcast::logging::{LoggingConfig, LogFormat};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//! ```

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Colored multi-line output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// `verbose` forces the `debug` level unless `RUST_LOG` is set
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Build from `SKEDCAST_LOG_FORMAT` / `SKEDCAST_LOG_LEVEL`, with CLI overrides
    pub fn from_env(format: Option<LogFormat>, verbose: bool) -> Self {
        let format = format
            .or_else(|| {
                std::env::var("SKEDCAST_LOG_FORMAT")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or(LogFormat::Text);
        let level = std::env::var("SKEDCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, verbose)
    }

    fn filter(&self) -> tracing_subscriber::EnvFilter {
        use tracing_subscriber::EnvFilter;

        let fallback = if self.verbose { "debug" } else { &self.level };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }

    /// Install the global subscriber. Call once, early in `main`.
    ///
    /// Ignores a second initialization so tests and embedding callers can
    /// call it freely.
    pub fn init(&self) {
        let filter = self.filter();

        let _ = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };
    }
}

/// Initialize logging from environment variables only
pub fn init_default() {
    LoggingConfig::from_env(None, false).init();
}
