//! API routes.

pub mod correlations;
pub mod events;
pub mod health;
pub mod investigations;

use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .merge(health::routes())
        .with_state(state)
}

/// API routes under the versioned prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::routes())
        .nest("/investigations", investigations::routes())
        .nest("/correlations", correlations::routes())
}
