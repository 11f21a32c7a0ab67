//! Audit routes over the raw event log.

use axum::extract::{Query, State};
use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use masail_documents::application::query_handlers::{self, EventView};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for GET /events.
#[derive(Debug, Deserialize)]
pub struct EventsParams {
    /// Event type name, e.g. `DocumentCreated`.
    pub event_type: String,
    /// Only events at or after this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// GET /events
///
/// Lists events of one document event type in timestamp order. An
/// `event_type` outside the seven document event types is answered with
/// `400 Bad Request` and error code `validation_error`. A missing
/// `event_type` is rejected by the query extractor with `400` as well.
#[instrument(skip(state))]
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = query_handlers::events_of_type(
        &params.event_type,
        params.since,
        state.event_repository.as_ref(),
    )
    .await?;
    Ok(Json(events))
}

/// Returns the router for event log queries.
pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(list_events))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::documents;
    use crate::routes::test_helpers::{send, test_app_state};

    #[tokio::test]
    async fn test_events_of_type_lists_matching_events() {
        // Arrange
        let state = test_app_state();
        for title in ["A", "B"] {
            let (status, _) = send(
                documents::router().with_state(state.clone()),
                "POST",
                "/documents",
                Some(&json!({ "title": title, "question": "Q", "answer": "Ans" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        // Act
        let (status, json) = send(
            router().with_state(state),
            "GET",
            "/events?event_type=DocumentCreated&since=2026-01-01T00:00:00Z",
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        let events = json.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e["event_type"] == "DocumentCreated"));
        assert_eq!(events[0]["data"]["title"], "A");
    }

    #[tokio::test]
    async fn test_since_after_every_event_returns_empty_list() {
        // Arrange
        let state = test_app_state();
        send(
            documents::router().with_state(state.clone()),
            "POST",
            "/documents",
            Some(&json!({ "title": "A", "question": "Q", "answer": "Ans" })),
        )
        .await;

        // Act
        let (status, json) = send(
            router().with_state(state),
            "GET",
            "/events?event_type=DocumentCreated&since=2027-01-01T00:00:00Z",
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_event_type_returns_400() {
        let app = router().with_state(test_app_state());

        let (status, json) = send(app, "GET", "/events?event_type=DocumentArchived", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_missing_event_type_returns_400() {
        let app = router().with_state(test_app_state());

        let (status, _) = send(app, "GET", "/events", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
