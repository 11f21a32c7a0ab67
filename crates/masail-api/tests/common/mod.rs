//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use masail_core::clock::Clock;
use masail_core::repository::EventRepository;
use masail_documents::read_model::{DocumentProjectionStore, InMemoryDocumentProjection};
use masail_event_store::{InMemoryEventRepository, PgEventRepository};
use masail_read_model::PgDocumentProjection;
use masail_test_support::{FixedClock, RecordingNotificationHook};
use sqlx::PgPool;
use tower::ServiceExt;

use masail_api::app;
use masail_api::config::AppConfig;
use masail_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

fn state_over(
    event_repository: Arc<dyn EventRepository>,
    projection: Arc<dyn DocumentProjectionStore>,
) -> AppState {
    AppState::from_config(
        &AppConfig::default(),
        fixed_clock(),
        event_repository,
        projection,
        Arc::new(RecordingNotificationHook::new()),
    )
}

/// State backed by the in-memory event log and projection.
pub fn memory_state() -> AppState {
    state_over(
        Arc::new(InMemoryEventRepository::new(fixed_clock())),
        Arc::new(InMemoryDocumentProjection::new()),
    )
}

/// State backed by `PostgreSQL`, with both schemas created.
pub async fn pg_state(pool: PgPool) -> AppState {
    let event_repository = PgEventRepository::new(pool.clone());
    event_repository.ensure_schema().await.unwrap();
    let projection = PgDocumentProjection::new(pool);
    projection.ensure_schema().await.unwrap();
    state_over(Arc::new(event_repository), Arc::new(projection))
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    state: &AppState,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app(state.clone()), "POST", uri, Some(body)).await
}

/// Send a PATCH request with a JSON body and return the response.
pub async fn patch_json(
    state: &AppState,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app(state.clone()), "PATCH", uri, Some(body)).await
}

/// Send a DELETE request and return the response.
pub async fn delete(state: &AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app(state.clone()), "DELETE", uri, None).await
}

/// Send a GET request and return the response.
pub async fn get_json(state: &AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app(state.clone()), "GET", uri, None).await
}
