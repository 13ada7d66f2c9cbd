//! Event envelope and validator for Crosswatch.
//!
//! The envelope is the bounded, pre-sanitized record describing one
//! investigation update. Producers redact before anything crosses their
//! boundary; the validator here enforces the size and schema ceilings so
//! that nothing unbounded can enter the pipeline. Validation is pure and
//! side-effect free, and on the failure path it reports only the failing
//! field and observed size, never payload content.

use crate::tenant::{InvestigationKey, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Hard cap on the summary text, in bytes. Over the cap is a rejection,
/// never a truncation.
pub const MAX_SUMMARY_BYTES: usize = 2_048;

/// Hard cap on the category string, in bytes.
pub const MAX_CATEGORY_BYTES: usize = 128;

/// Maximum number of opaque resource references per envelope.
pub const MAX_RESOURCE_REFS: usize = 16;

/// Maximum number of named links per envelope.
pub const MAX_LINKS: usize = 16;

/// Ceiling on the total serialized envelope size, comfortably below the
/// transport message-size limit.
pub const MAX_ENVELOPE_BYTES: usize = 262_144;

/// How far ahead of ingestion time `occurred_at` may be before the
/// envelope is rejected as clock-skewed.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Severity of an investigation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle status of an investigation.
///
/// The variant order is the lifecycle order; the store never regresses a
/// record below the highest status it has seen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Investigating,
    RootCauseFound,
    Mitigated,
    Closed,
}

impl InvestigationStatus {
    /// Returns the wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::Investigating => "investigating",
            InvestigationStatus::RootCauseFound => "root_cause_found",
            InvestigationStatus::Mitigated => "mitigated",
            InvestigationStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An envelope as received on the wire, before validation.
///
/// Severity and status are typed enums, so values outside the enum are
/// rejected at deserialization, before `validate` runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeDraft {
    /// Opaque id, globally unique per tenant + investigation.
    pub investigation_id: String,
    /// The producing tenant.
    pub tenant_id: TenantId,
    /// Producer-assigned event time; correlation and dedup use this, not
    /// ingestion time.
    pub occurred_at: DateTime<Utc>,
    /// Severity of the investigation.
    pub severity: Severity,
    /// Lifecycle status reported by the producer.
    pub status: InvestigationStatus,
    /// Bounded classification string used as the correlation key.
    pub category: String,
    /// Bounded, already-redacted summary text.
    pub summary: String,
    /// Opaque resource identifiers, bounded count.
    #[serde(default)]
    pub resource_refs: Vec<String>,
    /// Named links to external views of the investigation.
    #[serde(default)]
    pub links: HashMap<String, String>,
}

/// A validated, immutable investigation event.
///
/// Constructed only through [`validate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub investigation_id: String,
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
    pub severity: Severity,
    pub status: InvestigationStatus,
    pub category: String,
    pub summary: String,
    pub resource_refs: Vec<String>,
    pub links: HashMap<String, String>,
}

impl Envelope {
    /// Returns the store key for this envelope.
    pub fn key(&self) -> InvestigationKey {
        InvestigationKey::new(self.tenant_id.clone(), self.investigation_id.clone())
    }
}

/// Why an envelope was rejected at the boundary.
///
/// Variants carry field names and sizes only; rejected payload content is
/// never echoed back or logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("field {field} is {size} bytes, over the {limit} byte cap")]
    FieldTooLarge {
        field: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("too many {field}: {count} over the limit of {limit}")]
    TooMany {
        field: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("envelope serializes to {size} bytes, over the {limit} byte ceiling")]
    EnvelopeTooLarge { size: usize, limit: usize },

    #[error("occurred_at is {skew_secs}s ahead of ingestion time (max {max_secs}s)")]
    ClockSkew { skew_secs: i64, max_secs: i64 },

    #[error("unknown or malformed tenant id")]
    MalformedTenant,

    #[error("envelope could not be serialized for the size check")]
    SizeCheckFailed,
}

/// Validates a draft envelope against the schema and size ceilings.
///
/// Pure and side-effect free: no logging, no persistence. `received_at`
/// is the ingestion timestamp used for the clock-skew guard.
pub fn validate(
    draft: EnvelopeDraft,
    received_at: DateTime<Utc>,
) -> Result<Envelope, ValidationError> {
    if draft.investigation_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "investigation_id",
        });
    }
    if !draft.tenant_id.is_well_formed() {
        return Err(ValidationError::MalformedTenant);
    }
    if draft.category.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "category" });
    }
    if draft.summary.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "summary" });
    }

    if draft.category.len() > MAX_CATEGORY_BYTES {
        return Err(ValidationError::FieldTooLarge {
            field: "category",
            size: draft.category.len(),
            limit: MAX_CATEGORY_BYTES,
        });
    }
    if draft.summary.len() > MAX_SUMMARY_BYTES {
        return Err(ValidationError::FieldTooLarge {
            field: "summary",
            size: draft.summary.len(),
            limit: MAX_SUMMARY_BYTES,
        });
    }
    if draft.resource_refs.len() > MAX_RESOURCE_REFS {
        return Err(ValidationError::TooMany {
            field: "resource_refs",
            count: draft.resource_refs.len(),
            limit: MAX_RESOURCE_REFS,
        });
    }
    if draft.links.len() > MAX_LINKS {
        return Err(ValidationError::TooMany {
            field: "links",
            count: draft.links.len(),
            limit: MAX_LINKS,
        });
    }

    let skew = (draft.occurred_at - received_at).num_seconds();
    if skew > MAX_CLOCK_SKEW_SECS {
        return Err(ValidationError::ClockSkew {
            skew_secs: skew,
            max_secs: MAX_CLOCK_SKEW_SECS,
        });
    }

    let serialized =
        serde_json::to_vec(&draft).map_err(|_| ValidationError::SizeCheckFailed)?;
    if serialized.len() > MAX_ENVELOPE_BYTES {
        return Err(ValidationError::EnvelopeTooLarge {
            size: serialized.len(),
            limit: MAX_ENVELOPE_BYTES,
        });
    }

    Ok(Envelope {
        investigation_id: draft.investigation_id,
        tenant_id: draft.tenant_id,
        occurred_at: draft.occurred_at,
        severity: draft.severity,
        status: draft.status,
        category: draft.category,
        summary: draft.summary,
        resource_refs: draft.resource_refs,
        links: draft.links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EnvelopeDraft {
        EnvelopeDraft {
            investigation_id: "inv-001".to_string(),
            tenant_id: TenantId::new("acme-prod"),
            occurred_at: Utc::now(),
            severity: Severity::High,
            status: InvestigationStatus::RootCauseFound,
            category: "db-connection-pool".to_string(),
            summary: "Connection pool exhaustion on primary database".to_string(),
            resource_refs: vec!["resource-a".to_string()],
            links: HashMap::from([(
                "investigation".to_string(),
                "https://agent.example.com/inv-001".to_string(),
            )]),
        }
    }

    #[test]
    fn test_valid_envelope_passes() {
        let envelope = validate(draft(), Utc::now()).unwrap();
        assert_eq!(envelope.investigation_id, "inv-001");
        assert_eq!(envelope.severity, Severity::High);
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut d = draft();
        d.investigation_id = "  ".to_string();
        assert_eq!(
            validate(d, Utc::now()),
            Err(ValidationError::MissingField {
                field: "investigation_id"
            })
        );

        let mut d = draft();
        d.category = String::new();
        assert!(matches!(
            validate(d, Utc::now()),
            Err(ValidationError::MissingField { field: "category" })
        ));
    }

    #[test]
    fn test_malformed_tenant_rejected() {
        let mut d = draft();
        d.tenant_id = TenantId::new("Not A Tenant");
        assert_eq!(validate(d, Utc::now()), Err(ValidationError::MalformedTenant));
    }

    #[test]
    fn test_oversized_summary_rejected_not_truncated() {
        let mut d = draft();
        d.summary = "x".repeat(MAX_SUMMARY_BYTES + 1);
        let err = validate(d, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldTooLarge {
                field: "summary",
                size: MAX_SUMMARY_BYTES + 1,
                limit: MAX_SUMMARY_BYTES,
            }
        );
        // The error exposes the size only, never the content.
        assert!(!err.to_string().contains('x'));
    }

    #[test]
    fn test_summary_at_cap_accepted() {
        let mut d = draft();
        d.summary = "y".repeat(MAX_SUMMARY_BYTES);
        let envelope = validate(d, Utc::now()).unwrap();
        assert_eq!(envelope.summary.len(), MAX_SUMMARY_BYTES);
    }

    #[test]
    fn test_too_many_resource_refs_rejected() {
        let mut d = draft();
        d.resource_refs = (0..=MAX_RESOURCE_REFS).map(|i| format!("r-{i}")).collect();
        assert!(matches!(
            validate(d, Utc::now()),
            Err(ValidationError::TooMany {
                field: "resource_refs",
                ..
            })
        ));
    }

    #[test]
    fn test_clock_skew_guard() {
        let now = Utc::now();
        let mut d = draft();
        d.occurred_at = now + chrono::Duration::seconds(MAX_CLOCK_SKEW_SECS + 60);
        assert!(matches!(
            validate(d, now),
            Err(ValidationError::ClockSkew { .. })
        ));

        // A little skew within the bound is fine.
        let mut d = draft();
        d.occurred_at = now + chrono::Duration::seconds(MAX_CLOCK_SKEW_SECS - 1);
        assert!(validate(d, now).is_ok());
    }

    #[test]
    fn test_past_timestamps_always_accepted() {
        // Backfilled or replayed events may be arbitrarily old.
        let now = Utc::now();
        let mut d = draft();
        d.occurred_at = now - chrono::Duration::days(30);
        assert!(validate(d, now).is_ok());
    }

    #[test]
    fn test_status_lifecycle_ordering() {
        assert!(InvestigationStatus::Closed > InvestigationStatus::Mitigated);
        assert!(InvestigationStatus::Mitigated > InvestigationStatus::RootCauseFound);
        assert!(InvestigationStatus::RootCauseFound > InvestigationStatus::Investigating);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_unknown_severity_rejected_at_deserialization() {
        let raw = serde_json::json!({
            "investigation_id": "inv-1",
            "tenant_id": "acme",
            "occurred_at": "2026-01-01T00:00:00Z",
            "severity": "apocalyptic",
            "status": "investigating",
            "category": "c",
            "summary": "s"
        });
        assert!(serde_json::from_value::<EnvelopeDraft>(raw).is_err());
    }
}
