//! Investigation store for Crosswatch.
//!
//! Durable keyed state: one record per `(tenant_id, investigation_id)`,
//! with monotonic status transitions, an append-only envelope history, and
//! an append-only dispatch log. The engine never deletes records;
//! retention and expiry are external policy applied to the store.

pub mod memory;

use crate::action::{ActionKind, DispatchEntry};
use crate::envelope::{Envelope, InvestigationStatus};
use crate::tenant::{InvestigationKey, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing storage is unavailable. Retryable: callers either
    /// succeed or receive this explicit failure, an update is never
    /// silently dropped.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The addressed record does not exist.
    #[error("investigation not found: {0}")]
    NotFound(InvestigationKey),
}

impl StoreError {
    /// Returns whether the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// One investigation's stored state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRecord {
    /// Store key.
    pub key: InvestigationKey,
    /// The authoritative envelope: always the one with the highest
    /// lifecycle status seen so far, ties broken by latest `occurred_at`.
    pub envelope: Envelope,
    /// When the first envelope for this key arrived.
    pub first_seen_at: DateTime<Utc>,
    /// When the record was last touched by an upsert.
    pub last_updated_at: DateTime<Utc>,
    /// Append-only log of every dispatch attempt.
    pub dispatch_log: Vec<DispatchEntry>,
    /// Append-only audit of every accepted envelope, including ones that
    /// arrived with a regressed status.
    pub history: Vec<Envelope>,
    /// Set once the record is absorbed into a detected pattern.
    pub correlation_group_id: Option<Uuid>,
}

impl InvestigationRecord {
    fn new(envelope: Envelope, now: DateTime<Utc>) -> Self {
        Self {
            key: envelope.key(),
            history: vec![envelope.clone()],
            envelope,
            first_seen_at: now,
            last_updated_at: now,
            dispatch_log: Vec::new(),
            correlation_group_id: None,
        }
    }

    /// Returns whether a successful dispatch of `action` for `status` is
    /// already on record.
    pub fn has_succeeded(&self, action: ActionKind, status: InvestigationStatus) -> bool {
        self.dispatch_log.iter().any(|entry| {
            entry.action == action
                && entry.status_at_trigger == status
                && entry.outcome.is_success()
        })
    }

    /// Returns whether the investigation is still active (not closed).
    pub fn is_active(&self) -> bool {
        self.envelope.status != InvestigationStatus::Closed
    }
}

/// Result of an upsert.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// The stored record after the upsert.
    pub record: InvestigationRecord,
    /// Whether this envelope created the record.
    pub is_new: bool,
    /// Whether the incoming envelope carried an earlier status than the
    /// stored one. Such envelopes are kept in the history for audit but
    /// must not re-trigger already-dispatched actions.
    pub status_regressed: bool,
}

/// A window tuple returned by the category read path, used by the
/// correlator to rebuild or extend a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub key: InvestigationKey,
    pub occurred_at: DateTime<Utc>,
}

/// The investigation store contract.
///
/// All mutation goes through these operations; no component reads store
/// internals directly. Implementations must serialize operations touching
/// the same key so that the final state is delivery-order independent.
#[async_trait]
pub trait InvestigationStore: Send + Sync {
    /// Atomic read-modify-write keyed by `(tenant_id, investigation_id)`.
    ///
    /// The stored envelope is always the one with the highest lifecycle
    /// status, ties broken by the latest `occurred_at`, so concurrent or
    /// re-ordered deliveries converge to the same state.
    async fn upsert(
        &self,
        envelope: Envelope,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Appends one entry to a record's dispatch log. Never removes prior
    /// entries.
    async fn append_dispatch(
        &self,
        key: &InvestigationKey,
        entry: DispatchEntry,
    ) -> Result<(), StoreError>;

    /// Fetches one record.
    async fn get(&self, key: &InvestigationKey)
        -> Result<Option<InvestigationRecord>, StoreError>;

    /// Returns the `(key, occurred_at)` tuples for a category with
    /// `occurred_at >= since`, for correlation window rebuilds.
    async fn query_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CategoryEntry>, StoreError>;

    /// Stamps the given records with a correlation group id. Unknown keys
    /// are skipped; stamping is idempotent.
    async fn assign_correlation_group(
        &self,
        keys: &[InvestigationKey],
        group_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Lists records that are not yet closed, optionally for one tenant.
    async fn list_active(
        &self,
        tenant: Option<&TenantId>,
    ) -> Result<Vec<InvestigationRecord>, StoreError>;

    /// Returns the full envelope history for a record.
    async fn get_history(
        &self,
        key: &InvestigationKey,
    ) -> Result<Vec<Envelope>, StoreError>;
}

/// Compares two envelopes for storage authority: higher lifecycle status
/// wins; ties are broken by the later `occurred_at`.
pub(crate) fn supersedes(incoming: &Envelope, stored: &Envelope) -> bool {
    (incoming.status, incoming.occurred_at) > (stored.status, stored.occurred_at)
}
