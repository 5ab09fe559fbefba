//! Common error types for dishwise

use thiserror::Error;

/// Common result type for dishwise operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the dishwise services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue transport error (wraps queue::QueueError)
    #[error("Queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
