//! Operational routes.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use tracing::{info, instrument};

use masail_documents::application::reconciliation::{self, ReconciliationReport};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /admin/reconcile
#[instrument(skip(state))]
async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconciliationReport>, ApiError> {
    info!("handling on-demand reconciliation");
    let report = reconciliation::reconcile_projection(
        state.event_repository.as_ref(),
        state.projection.as_ref(),
        state.reconcile_batch_size,
    )
    .await?;
    Ok(Json(report))
}

/// Returns the router for operational endpoints.
pub fn router() -> Router<AppState> {
    Router::new().route("/admin/reconcile", post(reconcile))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::documents;
    use crate::routes::test_helpers::{failing_app_state, send, test_app_state};

    #[tokio::test]
    async fn test_reconcile_reports_scanned_events_and_checkpoint() {
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
        let (status, first) = send(
            router().with_state(state.clone()),
            "POST",
            "/admin/reconcile",
            None,
        )
        .await;
        let (_, second) = send(router().with_state(state), "POST", "/admin/reconcile", None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["scanned_events"], 1);
        assert_eq!(first["repaired"], json!([]));
        assert_eq!(first["checkpoint"], 1);
        assert_eq!(second["scanned_events"], 0);
        assert_eq!(second["rescanned_events"], 1);
        assert_eq!(second["checkpoint"], 1);
    }

    #[tokio::test]
    async fn test_reconcile_returns_500_when_log_fails() {
        let app = router().with_state(failing_app_state());

        let (status, json) = send(app, "POST", "/admin/reconcile", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }
}
