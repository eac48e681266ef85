//! Authenticated principal resolved by the identity middleware.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stowage_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;

/// The principal a validated API key resolves to. Inserted into request
/// extensions by the auth middleware and extracted by handlers.
#[derive(Debug, Clone, Copy)]
pub struct PrincipalContext {
    pub credential_id: Uuid,
    pub owner_id: Option<Uuid>,
}

impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PrincipalContext>()
            .copied()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authentication context".to_string(),
                ))
            })
    }
}
