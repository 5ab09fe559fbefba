//! Status polling handler

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use dishwise_common::Error;

use crate::error::{ApiError, ApiResult};
use crate::services::{StatusPayload, StatusResolver};
use crate::AppState;

/// GET /api/v1/dishes/status/{message_id}
///
/// Resolve the current status of one correlation group. Processing and
/// failed dishes answer with the correlation key only; completed dishes
/// answer with the full projection.
pub async fn get_status(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<StatusPayload>> {
    let resolver = StatusResolver::new(state.store.clone());

    let payload = resolver.status_for(message_id).await.map_err(|e| match e {
        Error::NotFound(msg) => ApiError::NotFound(msg),
        other => ApiError::Common(other),
    })?;

    Ok(Json(payload))
}

/// Build status routes
pub fn status_routes() -> Router<AppState> {
    Router::new().route("/api/v1/dishes/status/:message_id", get(get_status))
}
