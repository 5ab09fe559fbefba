//! Progress channel endpoints
//!
//! The worker POSTs progress events to the internal publish endpoint; the
//! API fans them out over the per-channel broadcast bus to SSE
//! subscribers. Events are transient: a client that subscribes late simply
//! misses the earlier checkpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dishwise_common::events::ProgressEvent;

use crate::AppState;

/// Keep-alive interval for SSE connections
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/v1/progress/{channel_id} - SSE stream of progress events
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(%channel_id, "New SSE client subscribed to progress channel");

    let rx = state.progress.subscribe(channel_id).await;
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default()
                .event("progress")
                .json_data(&event)
                .ok()
                .map(Ok),
            Err(e) => {
                // Lagged receiver; drop the gap and keep streaming
                warn!("SSE progress client lagged: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// POST /internal/progress/{channel_id} - worker-facing publish endpoint
///
/// Fire-and-forget: always answers 204 once the event reaches the bus,
/// whether or not anyone is subscribed.
pub async fn publish_progress(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Json(event): Json<ProgressEvent>,
) -> StatusCode {
    debug!(
        %channel_id,
        percentage = event.percentage,
        dish_name = %event.dish_name,
        "Progress event received"
    );

    state.progress.publish(channel_id, event).await;
    StatusCode::NO_CONTENT
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/progress/:channel_id", get(progress_stream))
        .route("/internal/progress/:channel_id", post(publish_progress))
}
