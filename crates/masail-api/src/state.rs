//! Shared application state.

use std::sync::Arc;

use masail_core::clock::Clock;
use masail_core::notification::NotificationHook;
use masail_core::repository::EventRepository;
use masail_documents::application::command_handlers::DocumentService;
use masail_documents::application::snapshot::DocumentSnapshotCache;
use masail_documents::read_model::DocumentProjectionStore;

use crate::config::AppConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document command service.
    pub documents: Arc<DocumentService>,
    /// Read model backing document queries.
    pub projection: Arc<dyn DocumentProjectionStore>,
    /// Event log backing history, replay and audit queries.
    pub event_repository: Arc<dyn EventRepository>,
    /// Events read per reconciliation batch.
    pub reconcile_batch_size: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("documents", &self.documents)
            .field("reconcile_batch_size", &self.reconcile_batch_size)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        documents: Arc<DocumentService>,
        projection: Arc<dyn DocumentProjectionStore>,
        event_repository: Arc<dyn EventRepository>,
        reconcile_batch_size: usize,
    ) -> Self {
        Self {
            documents,
            projection,
            event_repository,
            reconcile_batch_size,
        }
    }

    /// Wires a `DocumentService` over the given stores, applying the retry
    /// policy and snapshot cache size from `config`.
    #[must_use]
    pub fn from_config(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        event_repository: Arc<dyn EventRepository>,
        projection: Arc<dyn DocumentProjectionStore>,
        notifier: Arc<dyn NotificationHook>,
    ) -> Self {
        let mut service = DocumentService::new(
            clock,
            event_repository.clone(),
            projection.clone(),
            notifier,
        )
        .with_retry_policy(config.retry_policy());
        if config.snapshot_cache_capacity > 0 {
            service = service.with_snapshot_cache(Arc::new(DocumentSnapshotCache::new(
                config.snapshot_cache_capacity,
            )));
        }
        Self::new(
            Arc::new(service),
            projection,
            event_repository,
            config.reconcile_batch_size,
        )
    }
}
