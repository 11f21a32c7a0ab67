//! Masail API server entry point.

use std::net::SocketAddr;
use std::time::Duration;

use tower_http::trace::TraceLayer;

use masail_api::config::AppConfig;
use masail_api::error::AppError;
use masail_api::{app, build_state, cors_layer, spawn_reconciler, telemetry};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(&config)?;

    tracing::info!("Starting Masail API server");

    let result = run(&config).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "server stopped with an error");
    }

    telemetry.shutdown();
    result
}

async fn run(config: &AppConfig) -> Result<(), AppError> {
    let state = build_state(config).await?;

    let reconciler = (config.reconcile_interval_secs > 0).then(|| {
        spawn_reconciler(
            state.clone(),
            Duration::from_secs(config.reconcile_interval_secs),
        )
    });

    let router = app(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config)?);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reconciler) = reconciler {
        reconciler.abort();
    }
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
