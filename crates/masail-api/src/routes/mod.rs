//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod documents;
pub mod events;
pub mod health;

/// Returns every versioned route, to be nested under `/api/v1`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(documents::router())
        .merge(events::router())
        .merge(admin::router())
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use masail_core::repository::EventRepository;
    use masail_documents::read_model::InMemoryDocumentProjection;
    use masail_event_store::InMemoryEventRepository;
    use masail_test_support::{FailingEventRepository, FixedClock, RecordingNotificationHook};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::state::AppState;

    pub(crate) fn state_with(event_repository: Arc<dyn EventRepository>) -> AppState {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        AppState::from_config(
            &AppConfig::default(),
            clock,
            event_repository,
            Arc::new(InMemoryDocumentProjection::new()),
            Arc::new(RecordingNotificationHook::new()),
        )
    }

    pub(crate) fn test_app_state() -> AppState {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        state_with(Arc::new(InMemoryEventRepository::new(clock)))
    }

    pub(crate) fn failing_app_state() -> AppState {
        state_with(Arc::new(FailingEventRepository))
    }

    /// Sends one request and returns the status and decoded JSON body
    /// (`Value::Null` for an empty body).
    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
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
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
