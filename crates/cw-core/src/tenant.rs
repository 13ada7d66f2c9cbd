//! Tenant identity types for Crosswatch.
//!
//! A tenant is an isolated producer whose events must never be mixed with
//! another tenant's internal data. Tenant ids partition the store and are
//! checked at the ingestion boundary; only the correlator intentionally
//! looks across them.

use serde::{Deserialize, Serialize};

/// Identifies a producing client environment.
///
/// Used for isolation and fairness decisions only, never for content
/// inference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant id. No validation is performed here; callers
    /// that accept untrusted input should check [`TenantId::is_well_formed`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether the id is non-empty and uses only the allowed
    /// character set (lowercase alphanumerics, `-` and `_`).
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The store key for one investigation: globally unique per
/// tenant + investigation id pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvestigationKey {
    /// The producing tenant.
    pub tenant_id: TenantId,
    /// Opaque investigation identifier assigned by the producer.
    pub investigation_id: String,
}

impl InvestigationKey {
    /// Creates a new investigation key.
    pub fn new(tenant_id: TenantId, investigation_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            investigation_id: investigation_id.into(),
        }
    }
}

impl std::fmt::Display for InvestigationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.investigation_id)
    }
}
