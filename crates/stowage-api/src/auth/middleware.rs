//! API key authentication middleware.
//!
//! Requests to protected routes must carry `X-Api-Key`. Key comparison is
//! constant time so key length and prefix matches leak nothing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use stowage_core::{ApiKeyEntry, AppError};
use subtle::ConstantTimeEq;

use crate::auth::models::PrincipalContext;
use crate::error::HttpAppError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AuthState {
    pub api_keys: Vec<ApiKeyEntry>,
}

fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}

pub async fn auth_middleware(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Missing X-Api-Key header".to_string(),
            ))
        })?;

    let entry = auth
        .api_keys
        .iter()
        .find(|entry| secure_compare(entry.key.as_bytes(), presented.as_bytes()))
        .ok_or_else(|| HttpAppError(AppError::Unauthorized("Invalid API key".to_string())))?;

    request.extensions_mut().insert(PrincipalContext {
        credential_id: entry.credential_id,
        owner_id: entry.owner_id,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_compare_equal() {
        assert!(secure_compare(b"s3cret", b"s3cret"));
    }

    #[test]
    fn test_secure_compare_different_length() {
        assert!(!secure_compare(b"s3cret", b"s3cret-longer"));
    }

    #[test]
    fn test_secure_compare_same_length_different_bytes() {
        assert!(!secure_compare(b"s3cret", b"s3cres"));
    }
}
