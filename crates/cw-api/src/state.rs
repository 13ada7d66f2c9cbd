//! Application state shared across handlers.

use crate::auth::TokenMap;
use crate::pipeline::KeyLocks;
use crate::rate_limit::TenantRateLimiter;
use cw_core::{InvestigationStore, MemoryStore, PatternCorrelator};
use cw_dispatch::{Dispatcher, SinkRegistry};
use cw_policy::PolicyStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Investigation store.
    pub store: Arc<dyn InvestigationStore>,
    /// Current routing policy.
    pub policy: Arc<PolicyStore>,
    /// Action dispatcher.
    pub dispatcher: Arc<Dispatcher>,
    /// Cross-tenant pattern correlator.
    pub correlator: Arc<PatternCorrelator>,
    /// Token-to-tenant authentication table.
    pub auth: Arc<TokenMap>,
    /// Per-tenant ingestion rate limiter.
    pub rate_limiter: Arc<TenantRateLimiter>,
    /// Serializes the upsert-and-dispatch pipeline per investigation key.
    pub key_locks: Arc<KeyLocks>,
}

impl AppState {
    /// Creates a state around the given store and auth table.
    pub fn new(
        store: Arc<dyn InvestigationStore>,
        policy: PolicyStore,
        dispatcher: Dispatcher,
        correlator: PatternCorrelator,
        auth: TokenMap,
        rate_limiter: TenantRateLimiter,
    ) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
            dispatcher: Arc::new(dispatcher),
            correlator: Arc::new(correlator),
            auth: Arc::new(auth),
            rate_limiter: Arc::new(rate_limiter),
            key_locks: Arc::new(KeyLocks::default()),
        }
    }

    /// In-memory state with logging sinks, for tests and local runs.
    pub fn in_memory(auth: TokenMap) -> Self {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(SinkRegistry::logging(), store.clone());
        Self::new(
            store,
            PolicyStore::default(),
            dispatcher,
            PatternCorrelator::new(Default::default()),
            auth,
            TenantRateLimiter::default(),
        )
    }
}
