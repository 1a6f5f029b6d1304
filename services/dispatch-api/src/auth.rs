//! Bearer credential resolution
//!
//! Tokens come from the static credential table in the service config; each
//! resolves to the `{userId, role, organizationId}` triple the access guard
//! consumes.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use binroute_dispatch::model::Caller;
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::Zeroize;

use crate::config::CredentialEntry;
use crate::error::ApiError;
use crate::state::AppState;

/// Token → caller lookup
#[derive(Debug, Default)]
pub struct CredentialTable {
    callers: HashMap<String, Caller>,
}

impl CredentialTable {
    pub fn new(entries: &[CredentialEntry]) -> Self {
        let callers = entries
            .iter()
            .map(|e| {
                (
                    e.token.expose().to_string(),
                    Caller::new(e.user_id.clone(), e.role, e.organization_id.clone()),
                )
            })
            .collect();
        Self { callers }
    }

    pub fn resolve(&self, token: &str) -> Option<&Caller> {
        self.callers.get(token)
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl Drop for CredentialTable {
    fn drop(&mut self) {
        for (mut token, _) in self.callers.drain() {
            token.zeroize();
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The resolved caller of a request
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::Unauthenticated)?;
        state
            .credentials
            .resolve(token)
            .cloned()
            .map(Authenticated)
            .ok_or(ApiError::Unauthenticated)
    }
}
