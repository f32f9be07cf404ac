//! Tracing setup for binaries and integration tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::context::StageConfig;

/// Output format for the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line text.
    #[default]
    Text,
    /// JSON lines, one event per line.
    Json,
}

/// How to configure the global subscriber.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Filter directives. None falls back to `RUST_LOG`, then `info`.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
    /// ANSI color in text output.
    pub ansi: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::Text,
            ansi: true,
        }
    }
}

impl TracingOptions {
    /// Derives options from the platform config keys `logLevel`,
    /// `logFormat`, and `logColor`.
    #[must_use]
    pub fn from_config(config: &StageConfig) -> Self {
        Self {
            filter: config.string_value("logLevel"),
            format: match config.string_value("logFormat").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            ansi: config
                .string_value("logColor")
                .map_or(true, |color| color != "false"),
        }
    }
}

/// Installs the global tracing subscriber with default options.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Returns false
/// when a subscriber was already installed, which is the norm when
/// several tests race to initialize.
pub fn init_tracing() -> bool {
    init_tracing_with(&TracingOptions::default())
}

/// Installs the global tracing subscriber with explicit options.
pub fn init_tracing_with(options: &TracingOptions) -> bool {
    let filter = options.filter.as_deref().map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );

    let builder = fmt().with_env_filter(filter).with_ansi(options.ansi);
    match options.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    }
}
