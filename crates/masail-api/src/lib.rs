//! Masail API — HTTP surface of the document archive.
//!
//! Exposes the document commands and queries as JSON over axum, wires the
//! event log and read model chosen by configuration, and runs the periodic
//! projection reconciliation.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use masail_core::clock::{Clock, SystemClock};
use masail_core::repository::EventRepository;
use masail_documents::application::reconciliation::reconcile_projection;
use masail_documents::read_model::{DocumentProjectionStore, InMemoryDocumentProjection};
use masail_event_store::{InMemoryEventRepository, PgEventRepository};
use masail_read_model::PgDocumentProjection;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

pub mod config;
pub mod error;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod telemetry;

use config::AppConfig;
use error::AppError;
use notifier::TracingNotificationHook;
use state::AppState;

/// Builds the full router: `/health` plus every route under `/api/v1`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_router())
        .with_state(state)
}

/// Connects the stores selected by `config` and wires the application state.
///
/// With a `DATABASE_URL` the `PostgreSQL` event log and projection are used
/// and their tables created if missing. Without one the in-memory stores are
/// used and nothing survives a restart.
///
/// # Errors
///
/// Returns `AppError::Database` if the pool cannot connect and
/// `AppError::Storage` if the schema cannot be created.
pub async fn build_state(config: &AppConfig) -> Result<AppState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (event_repository, projection): (
        Arc<dyn EventRepository>,
        Arc<dyn DocumentProjectionStore>,
    ) = if let Some(database_url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await?;
        let event_repository = PgEventRepository::new(pool.clone());
        event_repository.ensure_schema().await?;
        let projection = PgDocumentProjection::new(pool);
        projection.ensure_schema().await?;
        info!("using PostgreSQL event log and projection");
        let event_repository: Arc<dyn EventRepository> = Arc::new(event_repository);
        let projection: Arc<dyn DocumentProjectionStore> = Arc::new(projection);
        (event_repository, projection)
    } else {
        warn!("DATABASE_URL is not set; using in-memory stores");
        let event_repository: Arc<dyn EventRepository> =
            Arc::new(InMemoryEventRepository::new(clock.clone()));
        let projection: Arc<dyn DocumentProjectionStore> =
            Arc::new(InMemoryDocumentProjection::new());
        (event_repository, projection)
    };

    Ok(AppState::from_config(
        config,
        clock,
        event_repository,
        projection,
        Arc::new(TracingNotificationHook),
    ))
}

/// CORS policy: the configured origins, or any origin when none are set.
///
/// # Errors
///
/// Returns `AppError::Config` if an origin is not a valid header value.
pub fn cors_layer(config: &AppConfig) -> Result<CorsLayer, AppError> {
    let Some(origins) = &config.cors_allowed_origins else {
        return Ok(CorsLayer::permissive());
    };
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| AppError::Config(format!("invalid CORS origin {origin}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Runs `reconcile_projection` every `interval` until the task is aborted.
/// A failed pass is logged and retried on the next tick.
pub fn spawn_reconciler(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = reconcile_projection(
                state.event_repository.as_ref(),
                state.projection.as_ref(),
                state.reconcile_batch_size,
            )
            .await
            {
                error!(error = %err, "scheduled reconciliation failed");
            }
        }
    })
}
