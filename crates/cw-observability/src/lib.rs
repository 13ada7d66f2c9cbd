//! # cw-observability
//!
//! Logging and metrics infrastructure for Crosswatch.
//!
//! Structured logging through the tracing ecosystem, plus registration
//! of the metric families the router and dispatcher emit.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::register_metrics;
