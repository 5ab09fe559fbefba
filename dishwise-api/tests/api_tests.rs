//! Router-level tests for the dishwise API
//!
//! Drives the full router with in-memory collaborators through
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;
use uuid::Uuid;

use dishwise_api::AppState;
use dishwise_common::db::{DishStore, MemoryDishStore};
use dishwise_common::events::{ProgressBus, ProgressEvent};
use dishwise_common::queue::{MemoryQueue, QueueMessage};
use dishwise_common::{CorrelationIdentity, Dish, DishStatus};

struct TestApp {
    router: axum::Router,
    queue: Arc<MemoryQueue>,
    store: Arc<MemoryDishStore>,
    progress: ProgressBus,
}

fn test_app() -> TestApp {
    let queue = Arc::new(MemoryQueue::new());
    let store = Arc::new(MemoryDishStore::new());
    let progress = ProgressBus::new(16);

    let state = AppState::new(store.clone(), queue.clone(), progress.clone());
    let router = dishwise_api::build_router(state);

    TestApp {
        router,
        queue,
        store,
        progress,
    }
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_module_and_uptime() {
    let app = test_app();

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "dishwise-api");
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn submitting_a_dish_answers_202_with_correlation_ids() {
    let app = test_app();

    let response = app
        .router
        .oneshot(post_json(
            "/api/v1/dishes",
            json!({"dish_name": "Spaghetti Carbonara"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;

    assert_eq!(json["status"], "processing");
    assert_eq!(json["data"]["dish_name"], "Spaghetti Carbonara");
    let message_id: Uuid = json["data"]["message_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let channel_id: Uuid = json["progress"]["channel"].as_str().unwrap().parse().unwrap();
    assert!(!message_id.is_nil());
    assert!(!channel_id.is_nil());

    // The enqueued payload carries the same identity
    assert_eq!(app.queue.sent_count().await, 1);
    let body = app.queue.sent_bodies().await.pop().unwrap();
    let message = QueueMessage::decode(&body).unwrap();
    assert_eq!(message.message_id, message_id);
    assert_eq!(message.channel_id, channel_id);
}

#[tokio::test]
async fn blank_dish_name_is_rejected_without_enqueueing() {
    let app = test_app();

    let response = app
        .router
        .oneshot(post_json("/api/v1/dishes", json!({"dish_name": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    assert_eq!(app.queue.sent_count().await, 0);
}

#[tokio::test]
async fn queue_outage_surfaces_as_bad_gateway() {
    let app = test_app();
    app.queue.set_fail_sends(true);

    let response = app
        .router
        .oneshot(post_json("/api/v1/dishes", json!({"dish_name": "Pad Thai"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn status_of_an_unknown_message_id_is_404() {
    let app = test_app();

    let response = app
        .router
        .oneshot(get(&format!("/api/v1/dishes/status/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn status_reflects_a_processing_row() {
    let app = test_app();
    let identity = CorrelationIdentity::mint();
    app.store
        .create_or_update(&Dish::processing("Ramen", &identity))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(get(&format!(
            "/api/v1/dishes/status/{}",
            identity.message_id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "processing");
    assert_eq!(
        json["message_id"].as_str().unwrap(),
        identity.message_id.to_string()
    );
    assert!(json.get("ingredients").is_none());
}

#[tokio::test]
async fn completed_status_includes_the_full_projection() {
    let app = test_app();
    let identity = CorrelationIdentity::mint();
    let mut dish = Dish::processing("Ramen", &identity);
    dish.status = DishStatus::Completed;
    dish.ingredients = vec!["Noodles".to_string(), "Broth".to_string()];
    app.store.create_or_update(&dish).await.unwrap();

    let response = app
        .router
        .oneshot(get(&format!(
            "/api/v1/dishes/status/{}",
            identity.message_id
        )))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["name"], "Ramen");
    assert_eq!(json["ingredients"], json!(["Noodles", "Broth"]));
}

#[tokio::test]
async fn dishes_can_be_listed_fetched_and_deleted() {
    let app = test_app();
    let identity = CorrelationIdentity::mint();
    let mut dish = Dish::processing("Pad Thai", &identity);
    dish.status = DishStatus::Completed;
    dish.ingredients = vec!["Rice noodles".to_string(), "Peanuts".to_string()];
    app.store.create_or_update(&dish).await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/dishes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["dishes"][0]["name"], "Pad Thai");

    // Lookup is case-insensitive
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/dishes/pad%20thai"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ingredients"], json!(["Rice noodles", "Peanuts"]));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/dishes/Pad%20Thai")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(get("/api/v1/dishes/Pad%20Thai"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_unknown_dish_is_404() {
    let app = test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/dishes/Nothing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn internal_publish_reaches_channel_subscribers() {
    let app = test_app();
    let channel_id = Uuid::new_v4();
    let mut rx = app.progress.subscribe(channel_id).await;

    let event = ProgressEvent::at(30, "Fetching ingredients", "Ramen");
    let response = app
        .router
        .oneshot(post_json(
            &format!("/internal/progress/{}", channel_id),
            serde_json::to_value(&event).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let received = rx.recv().await.unwrap();
    assert_eq!(received.percentage, 30);
    assert_eq!(received.dish_name, "Ramen");
}

#[tokio::test]
async fn detect_text_without_a_configured_client_is_unavailable() {
    let app = test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/detect_text")
                .header(
                    "content-type",
                    "multipart/form-data; boundary=XBOUNDARY",
                )
                .body(Body::from(
                    "--XBOUNDARY--\r\n",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
