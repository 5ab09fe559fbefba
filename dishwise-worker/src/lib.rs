//! # Dishwise Worker Library
//!
//! The consumer side of the enrichment pipeline:
//! - Queue consumption loop with acknowledge-on-success semantics
//! - The dish processing state machine
//! - Enrichment provider contract and OpenAI client
//! - Best-effort progress publishing

pub mod consumer;
pub mod enrich;
pub mod processor;
pub mod publisher;

pub use consumer::Consumer;
pub use enrich::{EnrichmentError, IngredientProvider, OpenAiClient, ScriptedProvider};
pub use processor::{DishProcessor, ProcessError};
pub use publisher::{CollectingPublisher, HttpProgressPublisher, NoopPublisher, ProgressPublisher};
