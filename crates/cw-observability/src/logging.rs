//! Tracing bootstrap for the Crosswatch binary and its tests.
//!
//! All crates in the workspace log through `tracing`; this module owns
//! the subscriber setup so every entry point configures it the same way.
//! `RUST_LOG`, when set, overrides the configured level.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Subscriber options the service exposes.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level for the cw-* crates.
    pub level: Level,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Emit span open/close events.
    pub span_events: bool,
    /// Annotate events with source file and line.
    pub location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            location: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose plain-text output for local development.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json: false,
            span_events: true,
            location: true,
        }
    }

    /// JSON output for log aggregation.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json: true,
            span_events: false,
            location: false,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "cw_core={level},cw_policy={level},cw_dispatch={level},cw_api={level},cw_cli={level}",
                level = self.level
            ))
        })
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the default subscriber.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Installs a subscriber with the given options.
pub fn init_logging_with_config(config: LoggingConfig) {
    let registry = tracing_subscriber::registry().with(config.env_filter());
    let layer = fmt::layer()
        .with_span_events(config.span_events())
        .with_file(config.location)
        .with_line_number(config.location);
    if config.json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
}
