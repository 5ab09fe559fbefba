//! dishwise-worker - queue consumer for the dish-enrichment pipeline
//!
//! Runs N concurrent consumers over the dish request queue. Each consumer
//! pulls one message at a time, enriches the dish through the provider,
//! persists the result, and reports progress to the API service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dishwise_common::db::{self, SqliteDishStore};
use dishwise_common::queue::SqsQueue;
use dishwise_worker::{Consumer, DishProcessor, HttpProgressPublisher, OpenAiClient};

/// Command-line arguments for dishwise-worker
#[derive(Parser, Debug)]
#[command(name = "dishwise-worker")]
#[command(about = "Queue consumer for the dishwise enrichment pipeline")]
#[command(version)]
struct Args {
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

    /// Base URL of the API service receiving progress events
    #[arg(long, default_value = "http://localhost:9292", env = "DISHWISE_API_URL")]
    api_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: String,

    /// Chat model used for enrichment
    #[arg(long, default_value = dishwise_worker::enrich::DEFAULT_MODEL, env = "OPENAI_MODEL")]
    openai_model: String,

    /// Number of concurrent consumers
    #[arg(long, default_value = "2", env = "DISHWISE_WORKER_CONCURRENCY")]
    concurrency: usize,

    /// Enrichment call deadline in seconds
    #[arg(long, default_value = "30", env = "DISHWISE_ENRICHMENT_TIMEOUT")]
    enrichment_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dishwise_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting dishwise-worker");
    info!("Database: {}", args.database.display());
    info!("Queue: {}", args.queue_url);
    info!("Concurrency: {}", args.concurrency);

    let pool = db::init_database_pool(&args.database)
        .await
        .context("Failed to initialize database")?;
    let store = Arc::new(SqliteDishStore::new(pool));

    let queue: Arc<SqsQueue> = Arc::new(SqsQueue::new(args.queue_endpoint, args.queue_url));
    let provider = Arc::new(OpenAiClient::new(args.openai_api_key, args.openai_model));
    let publisher = Arc::new(HttpProgressPublisher::new(args.api_url));

    let processor = Arc::new(
        DishProcessor::new(store, provider, publisher)
            .with_enrichment_timeout(Duration::from_secs(args.enrichment_timeout)),
    );

    let cancel = CancellationToken::new();
    let mut handles = Vec::with_capacity(args.concurrency);

    for i in 0..args.concurrency {
        let consumer = Consumer::new(queue.clone(), processor.clone(), cancel.clone());
        handles.push(tokio::spawn(async move {
            info!("Consumer {} started", i);
            consumer.run().await;
        }));
    }

    shutdown_signal().await;
    info!("Shutdown requested, draining consumers");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    info!("Worker shutdown complete");
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
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
