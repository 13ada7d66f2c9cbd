//! Response shapes for the HTTP API.

use chrono::{DateTime, Utc};
use cw_core::{
    CorrelationGroup, DispatchEntry, Envelope, InvestigationRecord, InvestigationStatus,
    Severity, TenantId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when an event clears the ingestion boundary.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventAcceptedResponse {
    pub tenant_id: TenantId,
    pub investigation_id: String,
}

/// One investigation as seen through the query API.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvestigationResponse {
    pub investigation_id: String,
    pub tenant_id: TenantId,
    pub severity: Severity,
    pub status: InvestigationStatus,
    pub category: String,
    pub summary: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_group_id: Option<Uuid>,
    pub dispatch_log: Vec<DispatchEntry>,
}

impl From<InvestigationRecord> for InvestigationResponse {
    fn from(record: InvestigationRecord) -> Self {
        Self {
            investigation_id: record.key.investigation_id,
            tenant_id: record.key.tenant_id,
            severity: record.envelope.severity,
            status: record.envelope.status,
            category: record.envelope.category,
            summary: record.envelope.summary,
            first_seen_at: record.first_seen_at,
            last_updated_at: record.last_updated_at,
            correlation_group_id: record.correlation_group_id,
            dispatch_log: record.dispatch_log,
        }
    }
}

/// Envelope history for one investigation.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub investigation_id: String,
    pub entries: Vec<Envelope>,
}

/// A correlation group as shown to one tenant.
///
/// Member lists are filtered to the caller's own investigations; the
/// group itself only leaks the aggregate tenant count.
#[derive(Debug, Serialize, Deserialize)]
pub struct CorrelationGroupResponse {
    pub id: Uuid,
    pub category: String,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub distinct_tenants: usize,
    pub total_investigations: usize,
    /// The caller's own investigations that belong to this group.
    pub own_investigations: Vec<String>,
}

impl CorrelationGroupResponse {
    /// Builds the tenant-scoped view of a group.
    pub fn scoped_to(group: &CorrelationGroup, tenant: &TenantId) -> Self {
        Self {
            id: group.id,
            category: group.category.clone(),
            opened_at: group.opened_at,
            closed_at: group.closed_at,
            distinct_tenants: group.distinct_tenants,
            total_investigations: group.members.len(),
            own_investigations: group
                .members
                .iter()
                .filter(|key| &key.tenant_id == tenant)
                .map(|key| key.investigation_id.clone())
                .collect(),
        }
    }
}
