//! CLI commands.

pub mod serve;

pub use serve::run_server;
