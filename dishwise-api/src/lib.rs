//! dishwise-api library interface
//!
//! Hosts the producer (dish submission), the status correlator, the
//! progress fan-out, and the menu text-detection surface. All collaborators
//! are injected through `AppState`, so integration tests substitute the
//! in-memory queue and store for the production SQS and SQLite
//! implementations.

pub mod api;
pub mod error;
pub mod services;
pub mod vision;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use dishwise_common::db::DishStore;
use dishwise_common::events::ProgressBus;
use dishwise_common::queue::MessageQueue;
use vision::GoogleVisionClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Dish store (SQLite in production, in-memory in tests)
    pub store: Arc<dyn DishStore>,
    /// Message queue the producer enqueues to
    pub queue: Arc<dyn MessageQueue>,
    /// Per-channel progress fan-out for SSE subscribers
    pub progress: ProgressBus,
    /// Text-detection client; absent when no API key is configured
    pub vision: Option<Arc<GoogleVisionClient>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DishStore>,
        queue: Arc<dyn MessageQueue>,
        progress: ProgressBus,
    ) -> Self {
        Self {
            store,
            queue,
            progress,
            vision: None,
            startup_time: Utc::now(),
        }
    }

    /// Enable the text-detection surface
    pub fn with_vision(mut self, vision: Arc<GoogleVisionClient>) -> Self {
        self.vision = Some(vision);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::dish_routes())
        .merge(api::status_routes())
        .merge(api::progress_routes())
        .merge(api::detect_text_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
