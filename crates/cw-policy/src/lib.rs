//! # cw-policy
//!
//! Deterministic routing policy for Crosswatch.
//!
//! Rules map a validated envelope to the actions that should fire for it.
//! Rule sets are held in immutable snapshots that can be swapped at
//! runtime without pausing ingestion.

pub mod engine;
pub mod rules;
pub mod snapshot;

pub use engine::{resolve, RouteDecision};
pub use rules::{RoutingRule, RuleCondition};
pub use snapshot::{PolicyError, PolicySnapshot, PolicyStore, TenantPolicy};
