//! Test repositories — `EventRepository` doubles for failure paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use masail_core::error::DomainError;
use masail_core::repository::{EventRepository, NewEvent, StoredEvent};
use uuid::Uuid;

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_events_after(
        &self,
        _aggregate_id: Uuid,
        _after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_event(
        &self,
        _event: NewEvent,
        _expected_version: i64,
    ) -> Result<StoredEvent, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn latest_version(&self, _aggregate_id: Uuid) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn events_of_type(
        &self,
        _event_type: &str,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn events_after_sequence(
        &self,
        _after: i64,
        _limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn next_sequence(&self) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Wraps another repository and rejects the first `conflicts` appends with a
/// `ConcurrencyConflict`, simulating a writer that keeps racing ahead.
pub struct ConflictingEventRepository {
    inner: Arc<dyn EventRepository>,
    remaining_conflicts: AtomicUsize,
    append_attempts: AtomicUsize,
}

impl ConflictingEventRepository {
    /// Creates a wrapper that fails the next `conflicts` appends.
    #[must_use]
    pub fn new(inner: Arc<dyn EventRepository>, conflicts: usize) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicUsize::new(conflicts),
            append_attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `append_event` calls observed, including rejected ones.
    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConflictingEventRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictingEventRepository")
            .field("remaining_conflicts", &self.remaining_conflicts)
            .field("append_attempts", &self.append_attempts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(aggregate_id).await
    }

    async fn load_events_after(
        &self,
        aggregate_id: Uuid,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events_after(aggregate_id, after_version).await
    }

    async fn append_event(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<StoredEvent, DomainError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        let should_conflict = self
            .remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_conflict {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: event.aggregate_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.append_event(event, expected_version).await
    }

    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        self.inner.latest_version(aggregate_id).await
    }

    async fn events_of_type(
        &self,
        event_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.events_of_type(event_type, since).await
    }

    async fn events_after_sequence(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.events_after_sequence(after, limit).await
    }

    async fn next_sequence(&self) -> Result<i64, DomainError> {
        self.inner.next_sequence().await
    }
}
