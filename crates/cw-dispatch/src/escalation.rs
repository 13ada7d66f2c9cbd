//! Escalation note generation.
//!
//! When the correlator opens a cross-tenant group, the escalation that
//! fires carries a human-readable note about the pattern. The reasoner
//! trait is the seam for richer summarizers; the template fallback is
//! always available and never fails.

use async_trait::async_trait;
use cw_core::CorrelationGroup;

/// Produces the note attached to a pattern escalation.
#[async_trait]
pub trait EscalationReasoner: Send + Sync {
    async fn describe(&self, group: &CorrelationGroup) -> String;
}

/// Deterministic fallback reasoner built from the group itself.
#[derive(Default)]
pub struct TemplateReasoner;

#[async_trait]
impl EscalationReasoner for TemplateReasoner {
    async fn describe(&self, group: &CorrelationGroup) -> String {
        format!(
            "Cross-tenant pattern: {} tenants reported '{}' investigations in the same window ({} investigations involved)",
            group.distinct_tenants,
            group.category,
            group.members.len()
        )
    }
}
