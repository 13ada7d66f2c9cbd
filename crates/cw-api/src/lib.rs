//! # cw-api
//!
//! HTTP gateway for Crosswatch.
//!
//! This crate provides the ingestion endpoint tenants post investigation
//! summaries to, plus read endpoints for investigation state and
//! correlation groups. Every request is authenticated to a tenant and
//! rate limited per tenant so one noisy producer cannot starve the rest.

pub mod auth;
pub mod dto;
pub mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
