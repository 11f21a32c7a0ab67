//! Command handlers for the Document context.
//!
//! `DocumentService` runs every command through the same cycle: load the
//! aggregate, execute the command, append the single resulting event with
//! optimistic concurrency, apply it, then update the projection and notify.
//! A concurrency conflict restarts the cycle from a fresh load.

use std::sync::Arc;
use std::time::Duration;

use masail_core::aggregate::AggregateRoot;
use masail_core::clock::Clock;
use masail_core::command::Command;
use masail_core::error::DomainError;
use masail_core::event::DomainEvent;
use masail_core::notification::{CommitNotification, NotificationHook};
use masail_core::repository::{EventRepository, NewEvent, StoredEvent};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::snapshot::DocumentSnapshotCache;
use crate::domain::aggregates::Document;
use crate::domain::commands::{
    AddCategory, AddMadhab, CreateDocument, DeleteDocument, RemoveCategory, RemoveMadhab,
    UpdateDocument,
};
use crate::domain::events::DocumentEvent;
use crate::read_model::{DocumentProjectionStore, DocumentRow};

/// How often, and how patiently, a command is retried after a concurrency
/// conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Base delay between attempts; grows linearly and gets jitter added.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let max_jitter = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=max_jitter));
        self.backoff.saturating_mul(attempt).saturating_add(jitter)
    }
}

/// Whether the read model reflects a committed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectionStatus {
    /// The projection row was written.
    Synced,
    /// The event is committed but the projection write failed; the row is
    /// stale until reconciliation repairs it.
    Stale {
        /// The projection store's error.
        reason: String,
    },
}

impl ProjectionStatus {
    /// Returns `true` when the projection write succeeded.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub struct DocumentCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The event the command appended.
    pub stored_event: StoredEvent,
    /// State of the read model after the command.
    pub projection: ProjectionStatus,
}

/// Reconstitutes a `Document` from its stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if an event cannot be decoded or
/// the stream is not a contiguous run of versions for `document_id`.
pub(crate) fn reconstitute(
    document_id: Uuid,
    events: &[StoredEvent],
) -> Result<Document, DomainError> {
    let mut document = Document::new(document_id);
    replay_onto(&mut document, events)?;
    Ok(document)
}

/// Applies `events` to an already-replayed aggregate.
pub(crate) fn replay_onto(document: &mut Document, events: &[StoredEvent]) -> Result<(), DomainError> {
    for stored in events {
        if stored.aggregate_id != document.aggregate_id() {
            return Err(DomainError::Infrastructure(format!(
                "event {} belongs to aggregate {}, not {}",
                stored.event_id,
                stored.aggregate_id,
                document.aggregate_id()
            )));
        }
        if stored.version != document.version() + 1 {
            return Err(DomainError::Infrastructure(format!(
                "event stream of {} jumps from version {} to {}",
                stored.aggregate_id,
                document.version(),
                stored.version
            )));
        }
        let event = DocumentEvent::from_stored(stored)?;
        document.apply(&event);
    }
    Ok(())
}

fn to_new_event(event: &DocumentEvent, command: &dyn Command, attempt: u32) -> NewEvent {
    let meta = event.metadata();
    NewEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id,
        aggregate_type: Document::AGGREGATE_TYPE.to_owned(),
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        metadata: Some(serde_json::json!({
            "command": command.command_type(),
            "attempt": attempt,
        })),
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
    }
}

/// Application service that handles Document commands.
pub struct DocumentService {
    clock: Arc<dyn Clock>,
    event_repository: Arc<dyn EventRepository>,
    projection: Arc<dyn DocumentProjectionStore>,
    notifier: Arc<dyn NotificationHook>,
    snapshots: Option<Arc<DocumentSnapshotCache>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("snapshots", &self.snapshots)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// Creates a service with the default retry policy and no snapshot
    /// cache.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_repository: Arc<dyn EventRepository>,
        projection: Arc<dyn DocumentProjectionStore>,
        notifier: Arc<dyn NotificationHook>,
    ) -> Self {
        Self {
            clock,
            event_repository,
            projection,
            notifier,
            snapshots: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Uses `cache` to skip full replays.
    #[must_use]
    pub fn with_snapshot_cache(mut self, cache: Arc<DocumentSnapshotCache>) -> Self {
        self.snapshots = Some(cache);
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handles `CreateDocument`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for invalid fields,
    /// `DomainError::InvalidState` if the document already exists, and the
    /// event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, correlation_id = %command.correlation_id))]
    pub async fn create_document(
        &self,
        command: &CreateDocument,
    ) -> Result<DocumentCommandResult, DomainError> {
        command.validate()?;
        self.execute(command.document_id, command, |document, clock| {
            document.create(command, clock)
        })
        .await
    }

    /// Handles `UpdateDocument`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an invalid patch,
    /// `DomainError::AggregateNotFound` or `DomainError::InvalidState` from
    /// the aggregate, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, correlation_id = %command.correlation_id))]
    pub async fn update_document(
        &self,
        command: &UpdateDocument,
    ) -> Result<DocumentCommandResult, DomainError> {
        command.changes.validate()?;
        self.execute(command.document_id, command, |document, clock| {
            document.update(&command.changes, command.correlation_id, clock)
        })
        .await
    }

    /// Handles `DeleteDocument`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` or `DomainError::InvalidState`
    /// from the aggregate, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, correlation_id = %command.correlation_id))]
    pub async fn delete_document(
        &self,
        command: &DeleteDocument,
    ) -> Result<DocumentCommandResult, DomainError> {
        self.execute(command.document_id, command, |document, clock| {
            document.delete(command.correlation_id, clock)
        })
        .await
    }

    /// Handles `AddMadhab`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` or `DomainError::InvalidState`
    /// from the aggregate, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, madhab_id = %command.madhab_id))]
    pub async fn add_madhab(&self, command: &AddMadhab) -> Result<DocumentCommandResult, DomainError> {
        self.execute(command.document_id, command, |document, clock| {
            document.add_madhab(command.madhab_id, command.correlation_id, clock)
        })
        .await
    }

    /// Handles `RemoveMadhab`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the madhab is not tagged, the
    /// aggregate's lifecycle errors, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, madhab_id = %command.madhab_id))]
    pub async fn remove_madhab(
        &self,
        command: &RemoveMadhab,
    ) -> Result<DocumentCommandResult, DomainError> {
        self.execute(command.document_id, command, |document, clock| {
            document.remove_madhab(command.madhab_id, command.correlation_id, clock)
        })
        .await
    }

    /// Handles `AddCategory`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` or `DomainError::InvalidState`
    /// from the aggregate, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, category_id = %command.category_id))]
    pub async fn add_category(
        &self,
        command: &AddCategory,
    ) -> Result<DocumentCommandResult, DomainError> {
        self.execute(command.document_id, command, |document, clock| {
            document.add_category(command.category_id, command.correlation_id, clock)
        })
        .await
    }

    /// Handles `RemoveCategory`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the category is not tagged, the
    /// aggregate's lifecycle errors, and the event log's errors otherwise.
    #[instrument(skip(self, command), fields(document_id = %command.document_id, category_id = %command.category_id))]
    pub async fn remove_category(
        &self,
        command: &RemoveCategory,
    ) -> Result<DocumentCommandResult, DomainError> {
        self.execute(command.document_id, command, |document, clock| {
            document.remove_category(command.category_id, command.correlation_id, clock)
        })
        .await
    }

    async fn execute<C, F>(
        &self,
        document_id: Uuid,
        command: &C,
        mut decide: F,
    ) -> Result<DocumentCommandResult, DomainError>
    where
        C: Command,
        F: FnMut(&mut Document, &dyn Clock) -> Result<(), DomainError> + Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = self
                .attempt(document_id, command, &mut decide, attempt)
                .await;
            match outcome {
                Err(err) if err.is_conflict() => {
                    if let Some(cache) = &self.snapshots {
                        cache.invalidate(document_id);
                    }
                    if attempt >= max_attempts {
                        warn!(%document_id, attempt, error = %err, "giving up after concurrency conflicts");
                        return Err(err);
                    }
                    warn!(%document_id, attempt, error = %err, "concurrency conflict, retrying from a fresh load");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn attempt<C, F>(
        &self,
        document_id: Uuid,
        command: &C,
        decide: &mut F,
        attempt: u32,
    ) -> Result<DocumentCommandResult, DomainError>
    where
        C: Command,
        F: FnMut(&mut Document, &dyn Clock) -> Result<(), DomainError> + Send,
    {
        let mut document = self.load(document_id).await?;
        decide(&mut document, self.clock.as_ref())?;

        let pending = match document.uncommitted_events() {
            [event] => event.clone(),
            events => {
                return Err(DomainError::Infrastructure(format!(
                    "{} produced {} events, expected exactly one",
                    command.command_type(),
                    events.len()
                )));
            }
        };

        let stored = self
            .event_repository
            .append_event(
                to_new_event(&pending, command, attempt),
                document.version(),
            )
            .await?;
        let projection = self.commit(&mut document, pending, &stored).await;

        info!(
            %document_id,
            event_type = %stored.event_type,
            version = stored.version,
            sequence = stored.sequence,
            attempt,
            "command handled"
        );

        Ok(DocumentCommandResult {
            aggregate_id: document_id,
            stored_event: stored,
            projection,
        })
    }

    /// Loads a document from the snapshot cache plus any newer events, or
    /// by full replay.
    async fn load(&self, document_id: Uuid) -> Result<Document, DomainError> {
        let cached = self
            .snapshots
            .as_ref()
            .and_then(|cache| cache.get(document_id));
        if let Some(mut document) = cached {
            let newer = self
                .event_repository
                .load_events_after(document_id, document.version())
                .await?;
            replay_onto(&mut document, &newer)?;
            return Ok(document);
        }

        let events = self.event_repository.load_events(document_id).await?;
        reconstitute(document_id, &events)
    }

    /// Applies the committed event, then updates snapshot, projection and
    /// notification hook.
    ///
    /// The event is already durable, so nothing here fails the command. The
    /// pending event is applied with the version and timestamp the log
    /// assigned rather than decoded back from the stored payload.
    async fn commit(
        &self,
        document: &mut Document,
        mut committed: DocumentEvent,
        stored: &StoredEvent,
    ) -> ProjectionStatus {
        document.clear_uncommitted_events();
        committed.metadata.version = stored.version;
        committed.metadata.occurred_at = stored.occurred_at;
        document.apply(&committed);

        if let Some(cache) = &self.snapshots {
            cache.store(document);
        }

        let row = DocumentRow::from_aggregate(document, stored.sequence);
        if let Err(err) = self.projection.upsert(&row).await {
            error!(
                aggregate_id = %stored.aggregate_id,
                version = stored.version,
                sequence = stored.sequence,
                error = %err,
                "projection write failed; row is stale until reconciled"
            );
            return ProjectionStatus::Stale {
                reason: err.to_string(),
            };
        }

        let notification = CommitNotification {
            aggregate_id: stored.aggregate_id,
            aggregate_type: stored.aggregate_type.clone(),
            event_type: stored.event_type.clone(),
            version: stored.version,
            sequence: stored.sequence,
        };
        if let Err(err) = self.notifier.notify(&notification).await {
            warn!(
                aggregate_id = %stored.aggregate_id,
                version = stored.version,
                error = %err,
                "post-commit notification failed"
            );
        }

        ProjectionStatus::Synced
    }
}
