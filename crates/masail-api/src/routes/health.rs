//! Liveness endpoint for the Masail API.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /health`. It does not touch the event log or projection.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Name of this service.
    pub service: String,
    /// Crate version of the running binary.
    pub version: String,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        service: "masail-api".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

/// Returns the liveness router, mounted outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
