//! Action sink abstraction.
//!
//! A sink is the outbound side of one action kind: the pager, the
//! ticketing system, the alert fan-out. Sinks classify their own
//! failures so the dispatcher can decide whether a retry is worthwhile.

use async_trait::async_trait;
use cw_core::{ActionKind, InvestigationKey, InvestigationStatus, Severity};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a sink needs to deliver one action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub key: InvestigationKey,
    pub severity: Severity,
    pub status: InvestigationStatus,
    pub category: String,
    pub summary: String,
    /// Present for escalations: why the action fired beyond plain routing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// How a delivery attempt ended, as classified by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkResponse {
    /// Delivered. `detail` carries a sink reference such as a ticket id.
    Ack { detail: Option<String> },
    /// Worth retrying: timeouts, throttling, server-side errors.
    TransientFailure { reason: String },
    /// Retrying cannot help: rejected payload, bad credentials.
    PermanentFailure { reason: String },
}

/// One outbound delivery target.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// Attempts one delivery. Transport errors must be mapped into a
    /// [`SinkResponse`] rather than bubbled up, so the dispatcher sees a
    /// uniform failure classification.
    async fn deliver(&self, request: &ActionRequest) -> SinkResponse;
}

/// Maps each action kind to the sink that handles it.
#[derive(Default, Clone)]
pub struct SinkRegistry {
    sinks: HashMap<ActionKind, Arc<dyn ActionSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the sink for an action kind, replacing any previous one.
    pub fn register(&mut self, action: ActionKind, sink: Arc<dyn ActionSink>) {
        self.sinks.insert(action, sink);
    }

    /// Looks up the sink for an action kind.
    pub fn get(&self, action: ActionKind) -> Option<Arc<dyn ActionSink>> {
        self.sinks.get(&action).cloned()
    }

    /// A registry that routes every action kind to a [`LogSink`].
    pub fn logging() -> Self {
        let mut registry = Self::new();
        for action in [
            ActionKind::Page,
            ActionKind::Ticket,
            ActionKind::Alert,
            ActionKind::Escalate,
        ] {
            registry.register(action, Arc::new(LogSink));
        }
        registry
    }
}

/// Sink that only logs. Used for local runs and as a safe default for
/// action kinds without an outbound integration configured.
pub struct LogSink;

#[async_trait]
impl ActionSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, request: &ActionRequest) -> SinkResponse {
        tracing::info!(
            action = request.action.as_str(),
            key = %request.key,
            severity = ?request.severity,
            status = request.status.as_str(),
            category = %request.category,
            "action delivered to log sink"
        );
        SinkResponse::Ack { detail: None }
    }
}

/// Scripted sink for tests: plays back a queue of responses and records
/// every request it saw.
#[derive(Default)]
pub struct MockSink {
    responses: tokio::sync::Mutex<std::collections::VecDeque<SinkResponse>>,
    requests: tokio::sync::Mutex<Vec<ActionRequest>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that plays back the given responses in order, then
    /// acks everything.
    pub fn scripted(responses: Vec<SinkResponse>) -> Self {
        Self {
            responses: tokio::sync::Mutex::new(responses.into()),
            requests: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Requests delivered so far.
    pub async fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ActionSink for MockSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, request: &ActionRequest) -> SinkResponse {
        self.requests.lock().await.push(request.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(SinkResponse::Ack { detail: None })
    }
}
