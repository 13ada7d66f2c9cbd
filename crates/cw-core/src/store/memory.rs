//! In-memory reference implementation of the investigation store.
//!
//! Records live behind one mutex per key inside a shared map, so upserts
//! for the same `(tenant_id, investigation_id)` are serialized while
//! different keys proceed in parallel. The map-level lock is held only to
//! look up or insert a slot, never across a record mutation.

use super::{
    supersedes, CategoryEntry, InvestigationRecord, InvestigationStore, StoreError,
    UpsertOutcome,
};
use crate::action::DispatchEntry;
use crate::envelope::Envelope;
use crate::tenant::{InvestigationKey, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type RecordSlot = Arc<Mutex<InvestigationRecord>>;

/// In-memory investigation store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<InvestigationKey, RecordSlot>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &InvestigationKey) -> Option<RecordSlot> {
        self.records.read().await.get(key).cloned()
    }
}

#[async_trait]
impl InvestigationStore for MemoryStore {
    async fn upsert(
        &self,
        envelope: Envelope,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = envelope.key();

        // Fast path: the record already exists.
        if let Some(slot) = self.slot(&key).await {
            let mut record = slot.lock().await;
            return Ok(apply(&mut record, envelope, now));
        }

        // Slow path: take the map write lock to create the slot. Another
        // upsert may have raced us here, so re-check under the lock.
        let slot = {
            let mut map = self.records.write().await;
            match map.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let record = InvestigationRecord::new(envelope.clone(), now);
                    let slot = Arc::new(Mutex::new(record.clone()));
                    map.insert(key, slot);
                    return Ok(UpsertOutcome {
                        record,
                        is_new: true,
                        status_regressed: false,
                    });
                }
            }
        };

        let mut record = slot.lock().await;
        Ok(apply(&mut record, envelope, now))
    }

    async fn append_dispatch(
        &self,
        key: &InvestigationKey,
        entry: DispatchEntry,
    ) -> Result<(), StoreError> {
        let slot = self
            .slot(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let mut record = slot.lock().await;
        record.dispatch_log.push(entry);
        record.last_updated_at = Utc::now();
        Ok(())
    }

    async fn get(
        &self,
        key: &InvestigationKey,
    ) -> Result<Option<InvestigationRecord>, StoreError> {
        match self.slot(key).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn query_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CategoryEntry>, StoreError> {
        let slots: Vec<RecordSlot> = self.records.read().await.values().cloned().collect();
        let mut entries = Vec::new();
        for slot in slots {
            let record = slot.lock().await;
            if record.envelope.category == category && record.envelope.occurred_at >= since {
                entries.push(CategoryEntry {
                    key: record.key.clone(),
                    occurred_at: record.envelope.occurred_at,
                });
            }
        }
        entries.sort_by(|a, b| (a.occurred_at, &a.key).cmp(&(b.occurred_at, &b.key)));
        Ok(entries)
    }

    async fn assign_correlation_group(
        &self,
        keys: &[InvestigationKey],
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        for key in keys {
            if let Some(slot) = self.slot(key).await {
                let mut record = slot.lock().await;
                if record.correlation_group_id.is_none() {
                    record.correlation_group_id = Some(group_id);
                    record.last_updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn list_active(
        &self,
        tenant: Option<&TenantId>,
    ) -> Result<Vec<InvestigationRecord>, StoreError> {
        let slots: Vec<RecordSlot> = self.records.read().await.values().cloned().collect();
        let mut records = Vec::new();
        for slot in slots {
            let record = slot.lock().await;
            if record.is_active() && tenant.map_or(true, |t| &record.key.tenant_id == t) {
                records.push(record.clone());
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn get_history(
        &self,
        key: &InvestigationKey,
    ) -> Result<Vec<Envelope>, StoreError> {
        let slot = self
            .slot(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let record = slot.lock().await;
        Ok(record.history.clone())
    }
}

/// Applies one envelope to an existing record under its key lock.
fn apply(
    record: &mut InvestigationRecord,
    envelope: Envelope,
    now: DateTime<Utc>,
) -> UpsertOutcome {
    let status_regressed = envelope.status < record.envelope.status;
    record.history.push(envelope.clone());
    if supersedes(&envelope, &record.envelope) {
        record.envelope = envelope;
    }
    record.last_updated_at = now;
    UpsertOutcome {
        record: record.clone(),
        is_new: false,
        status_regressed,
    }
}
