//! Maintenance operations.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReconcileQuery {
    /// Report drift without repairing it.
    #[serde(default)]
    pub dry: bool,
}

/// Reconcile the blob store against the metadata index
#[utoipa::path(
    post,
    path = "/api/v0/maintenance/reconcile",
    params(ReconcileQuery),
    responses(
        (status = 200, description = "Reconciliation report", body = stowage_services::ReconcileReport),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 500, description = "Blob store or index unreadable", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "maintenance"
)]
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Query(query): Query<ReconcileQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state.reconciliation.reconcile(query.dry).await?;
    Ok(Json(report))
}
