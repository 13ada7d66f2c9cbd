//! The retrying dispatcher.
//!
//! Delivery is at-least-once toward sinks and exactly-once per
//! `(action, status)` pair from the store's point of view: an action that
//! already succeeded for the investigation's current status is never
//! re-fired, and every attempt lands in the append-only dispatch log.

use crate::escalation::{EscalationReasoner, TemplateReasoner};
use crate::sink::{ActionRequest, SinkRegistry, SinkResponse};
use cw_core::{
    ActionKind, CorrelationGroup, DispatchEntry, DispatchOutcome, InvestigationRecord,
    InvestigationStore, StoreError,
};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors surfaced by the dispatcher. Sink failures are not errors here,
/// they are recorded outcomes.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bounds on delivery retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per action, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub base_backoff: Duration,
    /// Upper bound on any single backoff.
    pub max_backoff: Duration,
    /// Hard deadline per delivery attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Jittered exponential backoff before retry number `attempt` (the
    /// attempt that just failed, 1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_backoff);
        let jitter = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 2);
        capped + Duration::from_millis(jitter)
    }
}

/// Delivers routed actions through registered sinks.
pub struct Dispatcher {
    registry: SinkRegistry,
    store: Arc<dyn InvestigationStore>,
    retry: RetryPolicy,
    reasoner: Arc<dyn EscalationReasoner>,
    /// Groups that already had their escalation fired.
    escalated: Mutex<HashSet<Uuid>>,
}

impl Dispatcher {
    pub fn new(registry: SinkRegistry, store: Arc<dyn InvestigationStore>) -> Self {
        Self {
            registry,
            store,
            retry: RetryPolicy::default(),
            reasoner: Arc::new(TemplateReasoner),
            escalated: Mutex::new(HashSet::new()),
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the escalation reasoner.
    pub fn with_reasoner(mut self, reasoner: Arc<dyn EscalationReasoner>) -> Self {
        self.reasoner = reasoner;
        self
    }

    /// Fires the given actions for one investigation.
    ///
    /// Actions run in order. An action that already succeeded for the
    /// record's current status is not re-sent; the suppression itself is
    /// recorded as a `Skipped` entry, so re-delivered envelopes never
    /// double-page but the audit trail still shows they arrived.
    pub async fn dispatch(
        &self,
        record: &InvestigationRecord,
        actions: &[ActionKind],
    ) -> Result<(), DispatchError> {
        let status = record.envelope.status;
        for &action in actions {
            if record.has_succeeded(action, status) {
                tracing::debug!(
                    action = action.as_str(),
                    key = %record.key,
                    status = status.as_str(),
                    "action already succeeded for this status, skipping"
                );
                metrics::counter!("crosswatch_dispatch_skipped_total", "action" => action.as_str())
                    .increment(1);
                self.store
                    .append_dispatch(
                        &record.key,
                        DispatchEntry::new(action, status, DispatchOutcome::Skipped, None),
                    )
                    .await?;
                continue;
            }

            let request = ActionRequest {
                action,
                key: record.key.clone(),
                severity: record.envelope.severity,
                status,
                category: record.envelope.category.clone(),
                summary: record.envelope.summary.clone(),
                reason: None,
            };
            let (outcome, detail) = self.deliver_with_retry(&request).await?;
            self.store
                .append_dispatch(
                    &record.key,
                    DispatchEntry::new(action, status, outcome, detail.clone()),
                )
                .await?;
            if !outcome.is_success() {
                self.operator_alert(action, &record.key.to_string(), detail.as_deref());
            }
        }
        Ok(())
    }

    /// Fires the escalation for a newly opened correlation group.
    ///
    /// Each group escalates at most once, no matter how many members join
    /// after detection. The outcome is recorded on every member so any of
    /// them explains why the escalation happened.
    pub async fn dispatch_pattern(&self, group: &CorrelationGroup) -> Result<(), DispatchError> {
        {
            let mut escalated = self.escalated.lock().await;
            if !escalated.insert(group.id) {
                return Ok(());
            }
        }

        let Some(representative) = group.members.first() else {
            return Ok(());
        };
        let Some(record) = self.store.get(representative).await? else {
            tracing::warn!(key = %representative, "correlation member missing from store");
            return Ok(());
        };

        let reason = self.reasoner.describe(group).await;
        let request = ActionRequest {
            action: ActionKind::Escalate,
            key: representative.clone(),
            severity: record.envelope.severity,
            status: record.envelope.status,
            category: group.category.clone(),
            summary: reason.clone(),
            reason: Some(reason),
        };
        let (outcome, detail) = self.deliver_with_retry(&request).await?;
        metrics::counter!("crosswatch_pattern_escalations_total").increment(1);

        for member in &group.members {
            let Some(member_record) = self.store.get(member).await? else {
                continue;
            };
            self.store
                .append_dispatch(
                    member,
                    DispatchEntry::new(
                        ActionKind::Escalate,
                        member_record.envelope.status,
                        outcome,
                        detail.clone(),
                    ),
                )
                .await?;
        }
        if !outcome.is_success() {
            self.operator_alert(ActionKind::Escalate, &group.id.to_string(), detail.as_deref());
        }
        Ok(())
    }

    /// Runs the retry loop for one request. Intermediate transient
    /// failures are logged against the request's key; the final outcome
    /// is returned for the caller to record.
    async fn deliver_with_retry(
        &self,
        request: &ActionRequest,
    ) -> Result<(DispatchOutcome, Option<String>), DispatchError> {
        let Some(sink) = self.registry.get(request.action) else {
            return Ok((
                DispatchOutcome::Failed,
                Some(format!("no sink registered for {}", request.action.as_str())),
            ));
        };

        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let response =
                match tokio::time::timeout(self.retry.attempt_timeout, sink.deliver(request)).await
                {
                    Ok(response) => response,
                    Err(_) => SinkResponse::TransientFailure {
                        reason: format!("attempt timed out after {:?}", self.retry.attempt_timeout),
                    },
                };

            match response {
                SinkResponse::Ack { detail } => {
                    metrics::counter!(
                        "crosswatch_actions_dispatched_total",
                        "action" => request.action.as_str(),
                        "outcome" => "succeeded"
                    )
                    .increment(1);
                    return Ok((DispatchOutcome::Succeeded, detail));
                }
                SinkResponse::PermanentFailure { reason } => {
                    metrics::counter!(
                        "crosswatch_actions_dispatched_total",
                        "action" => request.action.as_str(),
                        "outcome" => "failed"
                    )
                    .increment(1);
                    return Ok((DispatchOutcome::Failed, Some(reason)));
                }
                SinkResponse::TransientFailure { reason } => {
                    if attempt == max_attempts {
                        metrics::counter!(
                            "crosswatch_actions_dispatched_total",
                            "action" => request.action.as_str(),
                            "outcome" => "failed"
                        )
                        .increment(1);
                        return Ok((
                            DispatchOutcome::Failed,
                            Some(format!("retries exhausted: {reason}")),
                        ));
                    }
                    tracing::warn!(
                        action = request.action.as_str(),
                        key = %request.key,
                        attempt,
                        %reason,
                        "transient delivery failure, will retry"
                    );
                    self.store
                        .append_dispatch(
                            &request.key,
                            DispatchEntry::new(
                                request.action,
                                request.status,
                                DispatchOutcome::TransientFailure,
                                Some(reason),
                            ),
                        )
                        .await?;
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                }
            }
        }
        unreachable!("loop returns on the final attempt")
    }

    fn operator_alert(&self, action: ActionKind, subject: &str, detail: Option<&str>) {
        tracing::error!(
            action = action.as_str(),
            subject,
            detail = detail.unwrap_or("unknown"),
            "action delivery failed terminally, operator attention required"
        );
        metrics::counter!("crosswatch_operator_alerts_total", "action" => action.as_str())
            .increment(1);
    }
}
