//! Correlation group endpoints.
//!
//! Groups are inherently cross-tenant, so the response redacts other
//! tenants' members down to an aggregate count.

use crate::auth::AuthenticatedTenant;
use crate::dto::CorrelationGroupResponse;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};

/// Creates the correlations router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_open_groups))
        .route("/closed", get(list_closed_groups))
}

/// Lists open correlation groups, scoped to the caller.
async fn list_open_groups(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<Json<Vec<CorrelationGroupResponse>>, ApiError> {
    let groups = state.correlator.open_groups().await;
    Ok(Json(
        groups
            .iter()
            .map(|group| CorrelationGroupResponse::scoped_to(group, &tenant))
            .collect(),
    ))
}

/// Lists recently closed groups, scoped to the caller.
async fn list_closed_groups(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<Json<Vec<CorrelationGroupResponse>>, ApiError> {
    let groups = state.correlator.closed_groups().await;
    Ok(Json(
        groups
            .iter()
            .map(|group| CorrelationGroupResponse::scoped_to(group, &tenant))
            .collect(),
    ))
}
