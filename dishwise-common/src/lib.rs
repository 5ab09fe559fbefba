//! # Dishwise Common Library
//!
//! Shared code for the dishwise services including:
//! - Dish entity and status state machine
//! - Correlation identity minting
//! - Queue message types and the MessageQueue contract
//! - DishStore contract with SQLite and in-memory implementations
//! - Progress event types and per-channel broadcast bus
//! - Dish name validation

pub mod db;
pub mod dish;
pub mod error;
pub mod events;
pub mod identity;
pub mod queue;
pub mod validate;

pub use dish::{Dish, DishStatus};
pub use error::{Error, Result};
pub use identity::CorrelationIdentity;
