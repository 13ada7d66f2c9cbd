//! Action and dispatch-log data models for Crosswatch.
//!
//! These types are shared by the routing engine (which resolves actions)
//! and the dispatcher (which executes them and records the outcome). The
//! dispatch log is the single source of truth for what has or has not
//! been sent downstream.

use crate::envelope::InvestigationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of external actions the router can resolve.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Page the on-call engineer.
    Page,
    /// Create or update a tracking ticket.
    Ticket,
    /// Send a broadcast alert to the operations channel.
    Alert,
    /// Escalate a cross-tenant pattern to senior engineers.
    Escalate,
}

impl ActionKind {
    /// Returns the wire string for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Page => "page",
            ActionKind::Ticket => "ticket",
            ActionKind::Alert => "alert",
            ActionKind::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The sink acknowledged the action.
    Succeeded,
    /// The sink failed transiently; the attempt was (or will be) retried.
    TransientFailure,
    /// Terminal failure: retries exhausted or the sink rejected the
    /// action permanently. Surfaced to operators, never retried further.
    Failed,
    /// The action was skipped because a prior success for the same
    /// status transition was already on record.
    Skipped,
}

impl DispatchOutcome {
    /// Returns whether this outcome represents a delivered action.
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Succeeded)
    }
}

/// One append-only line in an investigation's dispatch log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEntry {
    /// The action that was attempted.
    pub action: ActionKind,
    /// The investigation status that triggered the action. Idempotency is
    /// keyed by `(action, status_at_trigger)`: re-delivery of an envelope
    /// never re-fires an action for a status that already fired it.
    pub status_at_trigger: InvestigationStatus,
    /// What happened.
    pub outcome: DispatchOutcome,
    /// When the attempt was made.
    pub attempted_at: DateTime<Utc>,
    /// Optional sink-provided detail (error class, ticket id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DispatchEntry {
    /// Creates a new dispatch entry stamped with the current time.
    pub fn new(
        action: ActionKind,
        status_at_trigger: InvestigationStatus,
        outcome: DispatchOutcome,
        detail: Option<String>,
    ) -> Self {
        Self {
            action,
            status_at_trigger,
            outcome,
            attempted_at: Utc::now(),
            detail,
        }
    }
}
