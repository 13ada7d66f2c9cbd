//! The per-event processing pipeline.
//!
//! One accepted envelope flows through: persist, route, dispatch,
//! correlate. The pipeline holds a per-key lock across persist and
//! dispatch so two deliveries of the same investigation cannot interleave
//! and double-fire an action; different investigations run concurrently.

use crate::state::AppState;
use chrono::Utc;
use cw_core::{Envelope, InvestigationKey, PatternSignal, UpsertOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-investigation-key mutexes.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<InvestigationKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Returns the lock for a key, creating it on first use.
    pub async fn for_key(&self, key: &InvestigationKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Runs one envelope through the full pipeline.
///
/// Store and sink problems are logged and counted rather than returned:
/// by the time this runs, the producer already got its 202 and cannot do
/// anything with a failure.
pub async fn process_event(state: AppState, envelope: Envelope) {
    let key = envelope.key();
    let lock = state.key_locks.for_key(&key).await;
    let _guard = lock.lock().await;

    let outcome = match state.store.upsert(envelope.clone(), Utc::now()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(key = %key, error = %err, "failed to persist envelope");
            return;
        }
    };
    metrics::counter!("crosswatch_events_received_total").increment(1);

    if outcome.status_regressed {
        // Stale deliveries are audited in the history but drive nothing.
        tracing::info!(
            key = %key,
            status = envelope.status.as_str(),
            stored = outcome.record.envelope.status.as_str(),
            "envelope status is behind the stored record, audit only"
        );
        return;
    }

    route_and_dispatch(&state, &outcome).await;
    correlate(&state, &envelope).await;
}

async fn route_and_dispatch(state: &AppState, outcome: &UpsertOutcome) {
    let record = &outcome.record;
    let snapshot = state.policy.current().await;
    let decision = snapshot.route(&record.envelope);
    if !decision.is_actionable() {
        tracing::debug!(key = %record.key, "no actions resolved");
        return;
    }
    tracing::info!(
        key = %record.key,
        severity = %record.envelope.severity,
        actions = ?decision.actions,
        matched = ?decision.matched_rules,
        "routing decision resolved"
    );
    if let Err(err) = state.dispatcher.dispatch(record, &decision.actions).await {
        tracing::error!(key = %record.key, error = %err, "dispatch failed");
    }
}

async fn correlate(state: &AppState, envelope: &Envelope) {
    let Some(signal) = state.correlator.observe(envelope).await else {
        return;
    };
    match signal {
        PatternSignal::Detected { group } => {
            tracing::warn!(
                group_id = %group.id,
                category = %group.category,
                tenants = group.distinct_tenants,
                "cross-tenant pattern detected"
            );
            if let Err(err) = state
                .store
                .assign_correlation_group(&group.members, group.id)
                .await
            {
                tracing::error!(group_id = %group.id, error = %err, "failed to stamp group");
            }
            if let Err(err) = state.dispatcher.dispatch_pattern(&group).await {
                tracing::error!(group_id = %group.id, error = %err, "pattern escalation failed");
            }
        }
        PatternSignal::Joined { group_id, key } => {
            tracing::info!(%group_id, %key, "investigation joined correlation group");
            if let Err(err) = state
                .store
                .assign_correlation_group(std::slice::from_ref(&key), group_id)
                .await
            {
                tracing::error!(%group_id, error = %err, "failed to stamp group member");
            }
        }
    }
    let open = state.correlator.open_groups().await.len();
    metrics::gauge!("crosswatch_correlation_groups_open").set(open as f64);
}
