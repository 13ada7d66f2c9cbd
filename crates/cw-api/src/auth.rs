//! Bearer-token authentication.
//!
//! Each tenant is issued an opaque token. The extractor resolves the
//! token to a [`TenantId`]; handlers then enforce that a tenant only ever
//! touches its own data. Tokens are held in memory and loaded from
//! configuration at startup.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use cw_core::TenantId;
use std::collections::HashMap;

/// Token-to-tenant lookup table.
#[derive(Debug, Default, Clone)]
pub struct TokenMap {
    tokens: HashMap<String, TenantId>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a token map from `(token, tenant)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, TenantId)>) -> Self {
        Self {
            tokens: pairs.into_iter().collect(),
        }
    }

    /// Registers a token for a tenant.
    pub fn insert(&mut self, token: &str, tenant: TenantId) {
        self.tokens.insert(token.to_string(), tenant);
    }

    /// Resolves a bearer token to its tenant.
    pub fn resolve(&self, token: &str) -> Option<&TenantId> {
        self.tokens.get(token)
    }
}

/// The tenant a request authenticated as.
#[derive(Debug, Clone)]
pub struct AuthenticatedTenant(pub TenantId);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedTenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected bearer token".to_string()))?;

        match state.auth.resolve(token) {
            Some(tenant) => Ok(AuthenticatedTenant(tenant.clone())),
            None => Err(ApiError::Unauthorized("unknown token".to_string())),
        }
    }
}
