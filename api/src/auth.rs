//! Extracts the authenticated principal id from the `Authorization`
//! bearer header. Per the control API's design, the core treats the
//! token's subject as an opaque, already-authenticated principal id —
//! signature verification is the authenticator's job and out of scope
//! here; the bearer value is simply the principal's UUID.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use orchestrator_core::OrchestratorError;
use uuid::Uuid;

use crate::error::ApiError;

pub struct Principal(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError(OrchestratorError::Unauthorized))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError(OrchestratorError::Unauthorized))?;

        let id = Uuid::parse_str(token.trim()).map_err(|_| ApiError(OrchestratorError::Unauthorized))?;
        Ok(Principal(id))
    }
}
