//! Event ingestion endpoint.

use crate::auth::AuthenticatedTenant;
use crate::dto::EventAcceptedResponse;
use crate::error::ApiError;
use crate::pipeline;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use cw_core::{validate, EnvelopeDraft};

/// Creates the events router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(submit_event))
}

/// Accepts one investigation summary from a tenant.
///
/// The envelope is validated synchronously so the producer gets a precise
/// rejection; persistence, routing, and correlation run after the 202 is
/// returned.
async fn submit_event(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Json(draft): Json<EnvelopeDraft>,
) -> Result<(StatusCode, Json<EventAcceptedResponse>), ApiError> {
    if !state.rate_limiter.check(&tenant) {
        return Err(ApiError::RateLimitExceeded);
    }

    if draft.tenant_id != tenant {
        return Err(ApiError::Forbidden(format!(
            "token is not valid for tenant '{}'",
            draft.tenant_id
        )));
    }

    let envelope = validate(draft, Utc::now()).map_err(|err| {
        metrics::counter!("crosswatch_events_rejected_total", "reason" => reason_label(&err))
            .increment(1);
        tracing::debug!(tenant_id = %tenant, error = %err, "envelope rejected");
        ApiError::from(err)
    })?;

    let response = EventAcceptedResponse {
        tenant_id: envelope.tenant_id.clone(),
        investigation_id: envelope.investigation_id.clone(),
    };
    tokio::spawn(pipeline::process_event(state, envelope));

    Ok((StatusCode::ACCEPTED, Json(response)))
}

fn reason_label(err: &cw_core::ValidationError) -> &'static str {
    use cw_core::ValidationError::*;
    match err {
        MissingField { .. } => "missing_field",
        FieldTooLarge { .. } => "field_too_large",
        TooMany { .. } => "too_many",
        EnvelopeTooLarge { .. } => "envelope_too_large",
        ClockSkew { .. } => "clock_skew",
        MalformedTenant => "malformed_tenant",
        SizeCheckFailed => "size_check_failed",
    }
}
