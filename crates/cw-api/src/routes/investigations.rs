//! Investigation query endpoints.
//!
//! All reads are scoped to the authenticated tenant. There is no way to
//! address another tenant's investigation, so a wrong key reads as 404.

use crate::auth::AuthenticatedTenant;
use crate::dto::{HistoryResponse, InvestigationResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use cw_core::InvestigationKey;

/// Creates the investigations router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_investigations))
        .route("/:investigation_id", get(get_investigation))
        .route("/:investigation_id/history", get(get_history))
}

/// Lists the tenant's active (non-closed) investigations.
async fn list_investigations(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<Json<Vec<InvestigationResponse>>, ApiError> {
    let records = state.store.list_active(Some(&tenant)).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Fetches one investigation, including its dispatch log.
async fn get_investigation(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(investigation_id): Path<String>,
) -> Result<Json<InvestigationResponse>, ApiError> {
    let key = InvestigationKey::new(tenant, investigation_id);
    let record = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key.to_string()))?;
    Ok(Json(record.into()))
}

/// Returns the full envelope history for one investigation.
async fn get_history(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(investigation_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let key = InvestigationKey::new(tenant, investigation_id.clone());
    let entries = state.store.get_history(&key).await?;
    Ok(Json(HistoryResponse {
        investigation_id,
        entries,
    }))
}
