//! Cross-tenant pattern detection over sliding event-time windows.
//!
//! Each category keeps its own window of recent investigations, ordered by
//! `occurred_at`. When the number of distinct tenants in a window reaches
//! the configured threshold, a correlation group opens; later arrivals in
//! the same window join it. Windows slide on event time, so a late replay
//! of old envelopes cannot correlate with a fresh burst.

use crate::envelope::Envelope;
use crate::tenant::{InvestigationKey, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// How many closed groups to retain for inspection.
const CLOSED_GROUP_RETENTION: usize = 64;

/// Tuning for the pattern correlator.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Width of the sliding window.
    pub window: Duration,
    /// Distinct tenants required in one window to open a group.
    pub min_tenants: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            window: Duration::minutes(60),
            min_tenants: 3,
        }
    }
}

/// A detected cross-tenant pattern.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationGroup {
    pub id: Uuid,
    pub category: String,
    pub opened_at: DateTime<Utc>,
    /// Set once the window that produced this group has fully aged out.
    pub closed_at: Option<DateTime<Utc>>,
    /// Investigations associated with the group. Members are kept even
    /// after their window entries age out.
    pub members: Vec<InvestigationKey>,
    /// Distinct tenants observed when the group opened.
    pub distinct_tenants: usize,
}

impl CorrelationGroup {
    /// Returns whether the group is still accepting members.
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// What [`PatternCorrelator::observe`] noticed, if anything.
#[derive(Debug, Clone)]
pub enum PatternSignal {
    /// The distinct-tenant threshold was just crossed and a group opened.
    /// Fires exactly once per group.
    Detected { group: CorrelationGroup },
    /// An investigation joined a group that is already open.
    Joined {
        group_id: Uuid,
        key: InvestigationKey,
    },
}

/// One window entry, ordered by event time so eviction pops the oldest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WindowEntry {
    occurred_at: DateTime<Utc>,
    key: InvestigationKey,
}

#[derive(Default)]
struct CategoryWindow {
    entries: BTreeSet<WindowEntry>,
    tenant_counts: HashMap<TenantId, usize>,
    /// Latest event time seen for this category. The window slides on this,
    /// never on arrival time.
    latest: Option<DateTime<Utc>>,
    group: Option<CorrelationGroup>,
}

impl CategoryWindow {
    fn distinct_tenants(&self) -> usize {
        self.tenant_counts.len()
    }

    /// Drops entries older than `horizon`. Returns the group if it closed.
    fn evict(&mut self, horizon: DateTime<Utc>) -> Option<CorrelationGroup> {
        while self
            .entries
            .first()
            .map_or(false, |oldest| oldest.occurred_at < horizon)
        {
            let Some(entry) = self.entries.pop_first() else {
                break;
            };
            match self.tenant_counts.get_mut(&entry.key.tenant_id) {
                Some(count) if *count > 1 => *count -= 1,
                _ => {
                    self.tenant_counts.remove(&entry.key.tenant_id);
                }
            }
        }
        if self.entries.is_empty() {
            if let Some(mut group) = self.group.take() {
                group.closed_at = Some(Utc::now());
                return Some(group);
            }
        }
        None
    }
}

/// Sliding-window detector for category bursts spanning multiple tenants.
pub struct PatternCorrelator {
    config: CorrelatorConfig,
    windows: RwLock<HashMap<String, Arc<Mutex<CategoryWindow>>>>,
    closed: Mutex<Vec<CorrelationGroup>>,
}

impl PatternCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            closed: Mutex::new(Vec::new()),
        }
    }

    /// Feeds one accepted envelope into its category window.
    ///
    /// Returns [`PatternSignal::Detected`] the moment the distinct-tenant
    /// threshold is crossed, [`PatternSignal::Joined`] for later arrivals
    /// while the group stays open, and `None` otherwise. Re-delivery of an
    /// envelope already in the window is a no-op.
    pub async fn observe(&self, envelope: &Envelope) -> Option<PatternSignal> {
        let slot = self.window_slot(&envelope.category).await;
        let mut window = slot.lock().await;

        let entry = WindowEntry {
            occurred_at: envelope.occurred_at,
            key: envelope.key(),
        };
        if !window.entries.insert(entry.clone()) {
            return None;
        }
        *window
            .tenant_counts
            .entry(entry.key.tenant_id.clone())
            .or_insert(0) += 1;
        let latest = match window.latest {
            Some(latest) => latest.max(envelope.occurred_at),
            None => envelope.occurred_at,
        };
        window.latest = Some(latest);

        let horizon = latest - self.config.window;
        if let Some(closed) = window.evict(horizon) {
            self.retain_closed(closed).await;
        }
        // An envelope older than the window evicts itself immediately.
        if !window.entries.contains(&entry) {
            return None;
        }

        if let Some(group) = window.group.as_mut() {
            if group.members.contains(&entry.key) {
                return None;
            }
            group.members.push(entry.key.clone());
            return Some(PatternSignal::Joined {
                group_id: group.id,
                key: entry.key,
            });
        }

        if window.distinct_tenants() >= self.config.min_tenants {
            let mut members = Vec::new();
            for e in &window.entries {
                if !members.contains(&e.key) {
                    members.push(e.key.clone());
                }
            }
            let group = CorrelationGroup {
                id: Uuid::new_v4(),
                category: envelope.category.clone(),
                opened_at: Utc::now(),
                closed_at: None,
                members,
                distinct_tenants: window.distinct_tenants(),
            };
            window.group = Some(group.clone());
            return Some(PatternSignal::Detected { group });
        }

        None
    }

    /// Ages out quiet categories against the wall clock.
    ///
    /// Envelope timestamps are validated to sit within a small skew of the
    /// receiving clock, so `now` is a safe upper bound on event time.
    /// Returns the groups that closed during this sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<CorrelationGroup> {
        let slots: Vec<Arc<Mutex<CategoryWindow>>> =
            self.windows.read().await.values().cloned().collect();
        let horizon = now - self.config.window;
        let mut closed_now = Vec::new();
        for slot in slots {
            let mut window = slot.lock().await;
            if let Some(closed) = window.evict(horizon) {
                closed_now.push(closed);
            }
        }
        for group in &closed_now {
            self.retain_closed(group.clone()).await;
        }
        closed_now
    }

    /// Snapshot of all currently open groups.
    pub async fn open_groups(&self) -> Vec<CorrelationGroup> {
        let slots: Vec<Arc<Mutex<CategoryWindow>>> =
            self.windows.read().await.values().cloned().collect();
        let mut groups = Vec::new();
        for slot in slots {
            let window = slot.lock().await;
            if let Some(group) = &window.group {
                groups.push(group.clone());
            }
        }
        groups.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        groups
    }

    /// Recently closed groups, oldest first.
    pub async fn closed_groups(&self) -> Vec<CorrelationGroup> {
        self.closed.lock().await.clone()
    }

    async fn window_slot(&self, category: &str) -> Arc<Mutex<CategoryWindow>> {
        if let Some(slot) = self.windows.read().await.get(category) {
            return slot.clone();
        }
        let mut map = self.windows.write().await;
        map.entry(category.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CategoryWindow::default())))
            .clone()
    }

    async fn retain_closed(&self, group: CorrelationGroup) {
        let mut closed = self.closed.lock().await;
        closed.push(group);
        if closed.len() > CLOSED_GROUP_RETENTION {
            let overflow = closed.len() - CLOSED_GROUP_RETENTION;
            closed.drain(..overflow);
        }
    }
}
