//! Request authentication

use std::sync::Arc;

use axum::extract::FromRequestParts;
use http::header::AUTHORIZATION;
use http::request::Parts;

use crate::authn::context::RestrictedRequestContext;
use crate::errors::StackError;
use crate::server::error::ApiError;
use crate::server::state::ServerState;

/// Caller identity resolved from the `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub RestrictedRequestContext);

impl FromRequestParts<Arc<ServerState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StackError::Unauthorized("A valid authorisation token is missing".to_string()))?;

        let claims = state.tokens.parse(token)?;
        let context = RestrictedRequestContext::resolve(&claims, state.store.as_ref()).await?;
        Ok(AuthenticatedUser(context))
    }
}
