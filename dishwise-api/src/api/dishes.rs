//! Dish creation and read/delete handlers
//!
//! POST /api/v1/dishes is the producer edge of the pipeline: it answers 202
//! with correlation identifiers and never waits for enrichment. The read
//! and delete routes serve the stored results directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dishwise_common::Dish;

use crate::error::{ApiError, ApiResult};
use crate::services::{DishSubmitter, SubmitError};
use crate::AppState;

/// POST /api/v1/dishes request
#[derive(Debug, Deserialize)]
pub struct CreateDishRequest {
    pub dish_name: String,
}

/// POST /api/v1/dishes response
#[derive(Debug, Serialize)]
pub struct CreateDishResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub data: CreateDishData,
    pub progress: ProgressInfo,
}

#[derive(Debug, Serialize)]
pub struct CreateDishData {
    pub dish_name: String,
    pub message_id: Uuid,
}

/// Progress-channel pointer for subscribing clients
#[derive(Debug, Serialize)]
pub struct ProgressInfo {
    pub channel: Uuid,
}

/// GET /api/v1/dishes response
#[derive(Debug, Serialize)]
pub struct DishListResponse {
    pub count: usize,
    pub dishes: Vec<Dish>,
}

/// DELETE /api/v1/dishes/{name} response
#[derive(Debug, Serialize)]
pub struct DeleteDishResponse {
    pub status: &'static str,
    pub message: String,
}

/// POST /api/v1/dishes
///
/// Accept a dish for asynchronous enrichment. Returns 202 with the
/// correlation identifiers the caller needs for polling and progress.
pub async fn create_dish(
    State(state): State<AppState>,
    Json(request): Json<CreateDishRequest>,
) -> ApiResult<(StatusCode, Json<CreateDishResponse>)> {
    let submitter = DishSubmitter::new(state.queue.clone());

    let accepted = submitter
        .submit(&request.dish_name)
        .await
        .map_err(|e| match e {
            SubmitError::Validation(msg) => ApiError::BadRequest(msg),
            SubmitError::Queue(err) => ApiError::BadGateway(err.to_string()),
            SubmitError::Encoding(msg) => ApiError::Internal(msg),
        })?;

    let response = CreateDishResponse {
        status: "processing",
        message: "Dish request is being processed",
        data: CreateDishData {
            dish_name: accepted.dish_name,
            message_id: accepted.message_id,
        },
        progress: ProgressInfo {
            channel: accepted.channel_id,
        },
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/v1/dishes
///
/// List stored dishes, most recently touched first.
pub async fn list_dishes(State(state): State<AppState>) -> ApiResult<Json<DishListResponse>> {
    let dishes = state.store.list().await?;

    Ok(Json(DishListResponse {
        count: dishes.len(),
        dishes,
    }))
}

/// GET /api/v1/dishes/{name}
///
/// Fetch one dish by name, case-insensitively.
pub async fn get_dish(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Dish>> {
    let dish = state
        .store
        .find_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No dish named: {}", name)))?;

    Ok(Json(dish))
}

/// DELETE /api/v1/dishes/{name}
pub async fn delete_dish(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteDishResponse>> {
    let removed = state.store.delete_by_name(&name).await?;

    if !removed {
        return Err(ApiError::NotFound(format!("No dish named: {}", name)));
    }

    Ok(Json(DeleteDishResponse {
        status: "ok",
        message: format!("Removed dish: {}", name),
    }))
}

/// Build dish routes
pub fn dish_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/dishes", post(create_dish).get(list_dishes))
        .route("/api/v1/dishes/:name", get(get_dish).delete(delete_dish))
}
