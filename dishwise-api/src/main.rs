//! dishwise-api - HTTP service for the dish-enrichment pipeline
//!
//! Accepts dish creation requests (producer edge), serves status polling
//! and stored results, fans progress events out to SSE subscribers, and
//! offers menu-photo text detection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dishwise_api::vision::GoogleVisionClient;
use dishwise_api::AppState;
use dishwise_common::db::{self, SqliteDishStore};
use dishwise_common::events::ProgressBus;
use dishwise_common::queue::SqsQueue;

/// Buffered events per progress channel
const PROGRESS_CHANNEL_CAPACITY: usize = 100;

/// Command-line arguments for dishwise-api
#[derive(Parser, Debug)]
#[command(name = "dishwise-api")]
#[command(about = "HTTP API for the dishwise enrichment pipeline")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9292", env = "DISHWISE_API_PORT")]
    port: u16,

    /// Path to the SQLite database file
    #[arg(
        short,
        long,
        default_value = "data/dishwise.db",
        env = "DISHWISE_DATABASE"
    )]
    database: PathBuf,

    /// SQS-compatible queue endpoint
    #[arg(long, env = "DISHWISE_QUEUE_ENDPOINT")]
    queue_endpoint: String,

    /// URL of the dish request queue
    #[arg(long, env = "DISHWISE_QUEUE_URL")]
    queue_url: String,

    /// Google Vision API key; text detection is disabled when absent
    #[arg(long, env = "GOOGLE_VISION_API_KEY")]
    vision_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dishwise_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting dishwise-api on port {}", args.port);
    info!("Database: {}", args.database.display());
    info!("Queue: {}", args.queue_url);

    let pool = db::init_database_pool(&args.database)
        .await
        .context("Failed to initialize database")?;
    let store = Arc::new(SqliteDishStore::new(pool));

    let queue = Arc::new(SqsQueue::new(args.queue_endpoint, args.queue_url));
    let progress = ProgressBus::new(PROGRESS_CHANNEL_CAPACITY);

    let mut state = AppState::new(store, queue, progress);
    if let Some(key) = args.vision_api_key {
        state = state.with_vision(Arc::new(GoogleVisionClient::new(key)));
        info!("Text detection enabled");
    } else {
        info!("Text detection disabled (no Vision API key)");
    }

    let app = dishwise_api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
