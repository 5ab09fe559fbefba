//! Processor state-machine tests
//!
//! Drives `DishProcessor` against the in-memory store and scripted
//! provider, covering the happy path, failure paths, idempotent
//! redelivery, and progress-event ordering.

use std::sync::Arc;
use std::time::Duration;

use dishwise_common::db::{DishStore, MemoryDishStore};
use dishwise_common::queue::QueueMessage;
use dishwise_common::{CorrelationIdentity, Dish, DishStatus};
use dishwise_worker::{CollectingPublisher, DishProcessor, ProcessError, ScriptedProvider};

struct Harness {
    store: Arc<MemoryDishStore>,
    provider: Arc<ScriptedProvider>,
    publisher: Arc<CollectingPublisher>,
    processor: DishProcessor,
}

fn harness(provider: ScriptedProvider) -> Harness {
    let store = Arc::new(MemoryDishStore::new());
    let provider = Arc::new(provider);
    let publisher = Arc::new(CollectingPublisher::new());
    let processor = DishProcessor::new(store.clone(), provider.clone(), publisher.clone());

    Harness {
        store,
        provider,
        publisher,
        processor,
    }
}

fn carbonara_provider() -> ScriptedProvider {
    ScriptedProvider::new().insert(
        "Spaghetti Carbonara",
        vec!["Spaghetti", "Eggs", "Pancetta", "Parmesan"],
    )
}

fn message_for(dish_name: &str) -> QueueMessage {
    QueueMessage::new(dish_name, &CorrelationIdentity::mint())
}

#[tokio::test]
async fn happy_path_completes_the_dish_with_ordered_ingredients() {
    let h = harness(carbonara_provider());
    let message = message_for("Spaghetti Carbonara");

    let dish = h.processor.process(&message).await.unwrap();

    assert_eq!(dish.status, DishStatus::Completed);
    assert_eq!(
        dish.ingredients,
        vec!["Spaghetti", "Eggs", "Pancetta", "Parmesan"]
    );
    assert_eq!(dish.message_id, Some(message.message_id));

    let stored = h
        .store
        .find_by_message_id(message.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Completed);
}

#[tokio::test]
async fn happy_path_progress_is_monotonic_and_ends_at_100() {
    let h = harness(carbonara_provider());
    let message = message_for("Spaghetti Carbonara");

    h.processor.process(&message).await.unwrap();

    let events = h.publisher.events_for(message.channel_id).await;
    assert!(!events.is_empty());

    let percentages: Vec<i32> = events.iter().map(|e| e.percentage).collect();
    assert!(
        percentages.windows(2).all(|w| w[0] <= w[1]),
        "Percentages regressed: {:?}",
        percentages
    );
    assert_eq!(*percentages.last().unwrap(), 100);
    assert!(events.iter().all(|e| e.dish_name == "Spaghetti Carbonara"));
}

#[tokio::test]
async fn redelivered_message_is_idempotent() {
    let h = harness(carbonara_provider());
    let message = message_for("Spaghetti Carbonara");

    let first = h.processor.process(&message).await.unwrap();
    let second = h.processor.process(&message).await.unwrap();

    assert_eq!(first.status, DishStatus::Completed);
    assert_eq!(second.status, DishStatus::Completed);
    assert_eq!(first.id, second.id);
    assert_eq!(h.store.row_count().await, 1);

    // The terminal row short-circuits redelivery before the provider
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn unknown_dish_fails_with_a_negative_progress_event() {
    let h = harness(ScriptedProvider::new());
    let message = message_for("Zzznonexistent");

    let err = h.processor.process(&message).await.unwrap_err();
    assert!(matches!(err, ProcessError::Enrichment(_)));

    let stored = h
        .store
        .find_by_message_id(message.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Failed);
    assert!(stored.ingredients.is_empty());

    let events = h.publisher.events_for(message.channel_id).await;
    let error_event = events.iter().find(|e| e.is_error()).expect("error event");
    assert!(error_event.percentage < 0);
    assert!(error_event.message.contains("Unknown dish"));
}

#[tokio::test]
async fn failed_status_never_transitions_further() {
    let h = harness(ScriptedProvider::new());
    let message = message_for("Zzznonexistent");

    h.processor.process(&message).await.unwrap_err();

    // Redelivery of the same message finds the terminal row and succeeds
    // without touching the provider again
    let calls_after_failure = h.provider.call_count();
    let dish = h.processor.process(&message).await.unwrap();

    assert_eq!(dish.status, DishStatus::Failed);
    assert_eq!(h.provider.call_count(), calls_after_failure);
    assert_eq!(h.store.row_count().await, 1);
}

#[tokio::test]
async fn provider_api_failure_marks_the_dish_failed() {
    let provider = carbonara_provider();
    provider.set_fail_all(true);
    let h = harness(provider);
    let message = message_for("Spaghetti Carbonara");

    let err = h.processor.process(&message).await.unwrap_err();
    assert!(matches!(err, ProcessError::Enrichment(_)));

    let stored = h
        .store
        .find_by_message_id(message.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Failed);
}

#[tokio::test]
async fn slow_provider_times_out_into_failed() {
    let h = {
        let store = Arc::new(MemoryDishStore::new());
        let provider =
            Arc::new(carbonara_provider().with_delay(Duration::from_millis(200)));
        let publisher = Arc::new(CollectingPublisher::new());
        let processor = DishProcessor::new(store.clone(), provider.clone(), publisher.clone())
            .with_enrichment_timeout(Duration::from_millis(20));
        Harness {
            store,
            provider,
            publisher,
            processor,
        }
    };
    let message = message_for("Spaghetti Carbonara");

    let err = h.processor.process(&message).await.unwrap_err();
    assert!(matches!(err, ProcessError::Enrichment(_)));
    assert!(err.to_string().contains("timed out"));

    let stored = h
        .store
        .find_by_message_id(message.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Failed);

    let events = h.publisher.events_for(message.channel_id).await;
    assert!(events.iter().any(|e| e.is_error()));
}

#[tokio::test]
async fn persistence_failure_at_the_final_write_marks_the_dish_failed() {
    let h = harness(carbonara_provider());
    let message = message_for("Spaghetti Carbonara");

    // Seed the processing row, then refuse the completed upsert
    let identity = message.identity();
    h.store
        .create_or_update(&Dish::processing("Spaghetti Carbonara", &identity))
        .await
        .unwrap();
    h.store.set_fail_upserts(true);

    let err = h.processor.process(&message).await.unwrap_err();
    assert!(matches!(err, ProcessError::Persistence(_)));

    let stored = h
        .store
        .find_by_message_id(message.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Failed);

    let events = h.publisher.events_for(message.channel_id).await;
    assert!(events.iter().any(|e| e.is_error()));
}

#[tokio::test]
async fn first_touch_creation_failure_propagates() {
    let h = harness(carbonara_provider());
    h.store.set_fail_upserts(true);
    let message = message_for("Spaghetti Carbonara");

    let err = h.processor.process(&message).await.unwrap_err();
    assert!(matches!(err, ProcessError::Persistence(_)));
    assert_eq!(h.store.row_count().await, 0);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn second_request_for_the_same_name_takes_over_the_row() {
    let h = harness(carbonara_provider());

    let first = message_for("Spaghetti Carbonara");
    let second = message_for("Spaghetti Carbonara");

    h.processor.process(&first).await.unwrap();
    h.processor.process(&second).await.unwrap();

    // Names collapse to one row; the newer correlation group owns it
    assert_eq!(h.store.row_count().await, 1);
    let stored = h
        .store
        .find_by_message_id(second.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DishStatus::Completed);
    assert!(h
        .store
        .find_by_message_id(first.message_id)
        .await
        .unwrap()
        .is_none());
}
