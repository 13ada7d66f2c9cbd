//! End-to-end tests for the ingestion gateway.
//!
//! Each test drives the real router over in-memory state: a memory store,
//! the builtin policy, and mock sinks that record what they delivered.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use cw_api::auth::TokenMap;
use cw_api::rate_limit::TenantRateLimiter;
use cw_api::routes::create_router;
use cw_api::AppState;
use cw_core::{
    ActionKind, DispatchOutcome, InvestigationKey, InvestigationRecord, InvestigationStatus,
    MemoryStore, PatternCorrelator, TenantId,
};
use cw_dispatch::{Dispatcher, MockSink, SinkRegistry};
use cw_policy::PolicyStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state(events_per_minute: u32) -> (AppState, Arc<MockSink>) {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let sink = Arc::new(MockSink::new());
    let mut registry = SinkRegistry::new();
    for action in [
        ActionKind::Page,
        ActionKind::Ticket,
        ActionKind::Alert,
        ActionKind::Escalate,
    ] {
        registry.register(action, sink.clone());
    }
    let dispatcher = Dispatcher::new(registry, store.clone());

    let mut auth = TokenMap::new();
    auth.insert("tok-acme", TenantId::new("acme"));
    auth.insert("tok-globex", TenantId::new("globex"));
    auth.insert("tok-initech", TenantId::new("initech"));

    let state = AppState::new(
        store,
        PolicyStore::default(),
        dispatcher,
        PatternCorrelator::new(Default::default()),
        auth,
        TenantRateLimiter::new(events_per_minute),
    );
    (state, sink)
}

fn event_body(tenant: &str, id: &str, severity: &str) -> Value {
    json!({
        "investigation_id": id,
        "tenant_id": tenant,
        "occurred_at": Utc::now().to_rfc3339(),
        "severity": severity,
        "status": "investigating",
        "category": "db-pool",
        "summary": "connection pool exhausted on primary",
    })
}

async fn post_event(app: &Router, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/events")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get_json(app: &Router, token: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Polls the store until the record satisfies the predicate. The pipeline
/// runs in a spawned task after the 202, so reads need a little patience.
async fn wait_for_record(
    state: &AppState,
    key: &InvestigationKey,
    pred: impl Fn(&InvestigationRecord) -> bool,
) -> InvestigationRecord {
    for _ in 0..250 {
        if let Some(record) = state.store.get(key).await.unwrap() {
            if pred(&record) {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("record for {key} never reached the expected state");
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let (state, _) = test_state(100);
    let app = create_router(state);
    let body = event_body("acme", "inv-1", "high");

    let (status, _) = post_event(&app, None, &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, response) = post_event(&app, Some("tok-nobody"), &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_tenant_mismatch_is_forbidden() {
    let (state, _) = test_state(100);
    let app = create_router(state.clone());

    let (status, response) =
        post_event(&app, Some("tok-globex"), &event_body("acme", "inv-1", "high")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["code"], "FORBIDDEN");

    // Nothing was persisted for either tenant.
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    assert!(state.store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_severity_is_rejected() {
    let (state, _) = test_state(100);
    let app = create_router(state);

    let (status, _) =
        post_event(&app, Some("tok-acme"), &event_body("acme", "inv-1", "apocalyptic")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversize_summary_is_rejected_not_truncated() {
    let (state, _) = test_state(100);
    let app = create_router(state.clone());

    let mut body = event_body("acme", "inv-1", "high");
    body["summary"] = Value::String("x".repeat(4096));

    let (status, response) = post_event(&app, Some("tok-acme"), &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["code"], "UNPROCESSABLE_ENTITY");

    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    assert!(state.store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_future_timestamp_is_rejected() {
    let (state, _) = test_state(100);
    let app = create_router(state);

    let mut body = event_body("acme", "inv-1", "high");
    body["occurred_at"] =
        Value::String((Utc::now() + chrono::Duration::minutes(30)).to_rfc3339());

    let (status, _) = post_event(&app, Some("tok-acme"), &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_accepted_event_is_persisted_and_routed() {
    let (state, sink) = test_state(100);
    let app = create_router(state.clone());

    let (status, response) =
        post_event(&app, Some("tok-acme"), &event_body("acme", "inv-1", "high")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(response["investigation_id"], "inv-1");

    // High severity resolves page + ticket + alert under the builtin policy.
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    let record = wait_for_record(&state, &key, |r| r.dispatch_log.len() >= 3).await;
    assert_eq!(record.envelope.status, InvestigationStatus::Investigating);
    let fired: Vec<ActionKind> = record.dispatch_log.iter().map(|e| e.action).collect();
    assert!(fired.contains(&ActionKind::Page));
    assert!(fired.contains(&ActionKind::Ticket));
    assert!(fired.contains(&ActionKind::Alert));
    assert!(record
        .dispatch_log
        .iter()
        .all(|e| e.outcome == DispatchOutcome::Succeeded));
    assert_eq!(sink.requests().await.len(), 3);
}

#[tokio::test]
async fn test_duplicate_delivery_does_not_double_fire() {
    let (state, sink) = test_state(100);
    let app = create_router(state.clone());
    let body = event_body("acme", "inv-1", "high");

    let (status, _) = post_event(&app, Some("tok-acme"), &body).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    wait_for_record(&state, &key, |r| r.dispatch_log.len() >= 3).await;

    let (status, _) = post_event(&app, Some("tok-acme"), &body).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let record = wait_for_record(&state, &key, |r| r.dispatch_log.len() >= 6).await;

    // Second delivery is audited as skipped entries but fires nothing new.
    assert_eq!(record.history.len(), 2);
    let succeeded = record
        .dispatch_log
        .iter()
        .filter(|e| e.outcome == DispatchOutcome::Succeeded)
        .count();
    let skipped = record
        .dispatch_log
        .iter()
        .filter(|e| e.outcome == DispatchOutcome::Skipped)
        .count();
    assert_eq!(succeeded, 3);
    assert_eq!(skipped, 3);
    assert_eq!(sink.requests().await.len(), 3);
}

#[tokio::test]
async fn test_rate_limit_is_per_tenant() {
    let (state, _) = test_state(2);
    let app = create_router(state);

    for i in 0..2 {
        let (status, _) = post_event(
            &app,
            Some("tok-acme"),
            &event_body("acme", &format!("inv-{i}"), "low"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    let (status, response) =
        post_event(&app, Some("tok-acme"), &event_body("acme", "inv-3", "low")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response["code"], "RATE_LIMIT_EXCEEDED");

    // Another tenant is unaffected by the noisy one.
    let (status, _) =
        post_event(&app, Some("tok-globex"), &event_body("globex", "inv-1", "low")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_investigation_reads_are_tenant_scoped() {
    let (state, _) = test_state(100);
    let app = create_router(state.clone());

    post_event(&app, Some("tok-acme"), &event_body("acme", "inv-1", "medium")).await;
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    wait_for_record(&state, &key, |_| true).await;

    let (status, body) = get_json(&app, "tok-acme", "/api/v1/investigations/inv-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["category"], "db-pool");

    // The same id through another tenant's token does not exist.
    let (status, _) = get_json(&app, "tok-globex", "/api/v1/investigations/inv-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get_json(&app, "tok-acme", "/api/v1/investigations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cross_tenant_pattern_fires_escalation() {
    let (state, sink) = test_state(100);
    let app = create_router(state.clone());

    for (token, tenant) in [
        ("tok-acme", "acme"),
        ("tok-globex", "globex"),
        ("tok-initech", "initech"),
    ] {
        let (status, _) =
            post_event(&app, Some(token), &event_body(tenant, "inv-1", "high")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    // Three distinct tenants in one window: every member gets stamped with
    // the group and an escalation entry.
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    let record = wait_for_record(&state, &key, |r| {
        r.correlation_group_id.is_some()
            && r.dispatch_log
                .iter()
                .any(|e| e.action == ActionKind::Escalate)
    })
    .await;
    let group_id = record.correlation_group_id.unwrap();

    let escalations: Vec<_> = sink
        .requests()
        .await
        .into_iter()
        .filter(|r| r.action == ActionKind::Escalate)
        .collect();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("3 tenants"));

    // The correlation view shows the group but only the caller's members.
    let (status, body) = get_json(&app, "tok-acme", "/api/v1/correlations").await;
    assert_eq!(status, StatusCode::OK);
    let groups = body.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], group_id.to_string());
    assert_eq!(groups[0]["distinct_tenants"], 3);
    assert_eq!(groups[0]["own_investigations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_history_is_order_independent() {
    let (state, _) = test_state(100);
    let app = create_router(state.clone());

    let now = Utc::now();
    let mut mitigated = event_body("acme", "inv-1", "high");
    mitigated["status"] = Value::String("mitigated".to_string());
    mitigated["occurred_at"] = Value::String(now.to_rfc3339());
    let mut investigating = event_body("acme", "inv-1", "high");
    investigating["occurred_at"] =
        Value::String((now - chrono::Duration::minutes(10)).to_rfc3339());

    // The later status arrives first.
    post_event(&app, Some("tok-acme"), &mitigated).await;
    let key = InvestigationKey::new(TenantId::new("acme"), "inv-1");
    wait_for_record(&state, &key, |r| r.history.len() >= 1).await;
    post_event(&app, Some("tok-acme"), &investigating).await;

    let record = wait_for_record(&state, &key, |r| r.history.len() >= 2).await;
    assert_eq!(record.envelope.status, InvestigationStatus::Mitigated);

    let (status, body) = get_json(&app, "tok-acme", "/api/v1/investigations/inv-1/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_endpoints() {
    let (state, _) = test_state(100);
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
