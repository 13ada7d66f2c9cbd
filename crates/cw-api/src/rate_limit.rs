//! Per-tenant rate limiting.
//!
//! Fairness guard for the ingestion endpoint: each authenticated tenant
//! gets its own token bucket, so a tenant flooding events is throttled
//! without slowing anyone else down. Keys are authenticated tenant ids,
//! a bounded set, so a plain map suffices.

use cw_core::TenantId;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, Mutex},
};

/// Default per-tenant event budget (events per minute).
pub const DEFAULT_EVENTS_PER_MINUTE: u32 = 120;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Per-tenant token buckets for event ingestion.
pub struct TenantRateLimiter {
    limiters: Mutex<HashMap<TenantId, Arc<DirectLimiter>>>,
    quota: Quota,
}

impl TenantRateLimiter {
    /// Creates a limiter allowing `events_per_minute` per tenant.
    pub fn new(events_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(events_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: Mutex::new(HashMap::new()),
            quota: Quota::per_minute(per_minute),
        }
    }

    /// Checks whether this tenant may submit another event right now.
    pub fn check(&self, tenant: &TenantId) -> bool {
        let limiter = {
            let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
            limiters
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
                .clone()
        };
        let allowed = limiter.check().is_ok();
        if !allowed {
            metrics::counter!("crosswatch_rate_limited_total", "tenant" => tenant.to_string())
                .increment(1);
        }
        allowed
    }
}

impl Default for TenantRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENTS_PER_MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_per_tenant() {
        let limiter = TenantRateLimiter::new(2);
        let loud = TenantId::new("loud");
        let quiet = TenantId::new("quiet");

        assert!(limiter.check(&loud));
        assert!(limiter.check(&loud));
        assert!(!limiter.check(&loud));

        // The throttled tenant does not affect the other.
        assert!(limiter.check(&quiet));
    }
}
