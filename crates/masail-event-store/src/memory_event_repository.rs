//! In-memory implementation of the `EventRepository` trait.
//!
//! Each aggregate stream sits behind its own mutex, held only for the
//! compare-and-append. The stream map is write-locked only to register a new
//! stream, so appends to different aggregates never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use masail_core::clock::Clock;
use masail_core::error::DomainError;
use masail_core::repository::{EventRepository, NewEvent, StoredEvent};

type Stream = Arc<Mutex<Vec<StoredEvent>>>;

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::Infrastructure("event stream lock poisoned".into())
}

/// Event log held entirely in process memory.
pub struct InMemoryEventRepository {
    clock: Arc<dyn Clock>,
    streams: RwLock<HashMap<Uuid, Stream>>,
    sequence: AtomicI64,
}

impl std::fmt::Debug for InMemoryEventRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventRepository")
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InMemoryEventRepository {
    /// Creates an empty log that timestamps appends with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            streams: RwLock::new(HashMap::new()),
            sequence: AtomicI64::new(0),
        }
    }

    fn stream(&self, aggregate_id: Uuid) -> Result<Option<Stream>, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.get(&aggregate_id).cloned())
    }

    fn stream_or_insert(&self, aggregate_id: Uuid) -> Result<Stream, DomainError> {
        if let Some(stream) = self.stream(aggregate_id)? {
            return Ok(stream);
        }
        let mut streams = self.streams.write().map_err(poisoned)?;
        Ok(Arc::clone(streams.entry(aggregate_id).or_default()))
    }

    fn all_streams(&self) -> Result<Vec<Stream>, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.values().cloned().collect())
    }

    fn collect_matching<F>(&self, mut keep: F) -> Result<Vec<StoredEvent>, DomainError>
    where
        F: FnMut(&StoredEvent) -> bool,
    {
        let mut matched = Vec::new();
        for stream in self.all_streams()? {
            let events = stream.lock().map_err(poisoned)?;
            matched.extend(events.iter().filter(|e| keep(e)).cloned());
        }
        Ok(matched)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.load_events_after(aggregate_id, 0).await
    }

    async fn load_events_after(
        &self,
        aggregate_id: Uuid,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let Some(stream) = self.stream(aggregate_id)? else {
            return Ok(Vec::new());
        };
        let events = stream.lock().map_err(poisoned)?;
        Ok(events
            .iter()
            .filter(|e| e.version > after_version)
            .cloned()
            .collect())
    }

    async fn append_event(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<StoredEvent, DomainError> {
        if expected_version < 0 {
            return Err(DomainError::Validation(format!(
                "expected version must not be negative, got {expected_version}"
            )));
        }

        let aggregate_id = event.aggregate_id;
        let stream = self.stream_or_insert(aggregate_id)?;
        let mut events = stream.lock().map_err(poisoned)?;

        let actual = events.last().map_or(0, |e| e.version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = StoredEvent::from_new(event, expected_version + 1, sequence, self.clock.now());
        events.push(stored.clone());

        tracing::trace!(
            %aggregate_id,
            version = stored.version,
            sequence,
            "appended event to in-memory log"
        );
        Ok(stored)
    }

    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        let Some(stream) = self.stream(aggregate_id)? else {
            return Ok(0);
        };
        let events = stream.lock().map_err(poisoned)?;
        Ok(events.last().map_or(0, |e| e.version))
    }

    async fn events_of_type(
        &self,
        event_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self.collect_matching(|e| {
            e.event_type == event_type && since.is_none_or(|since| e.occurred_at >= since)
        })?;
        events.sort_by_key(|e| (e.occurred_at, e.sequence));
        Ok(events)
    }

    async fn events_after_sequence(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self.collect_matching(|e| e.sequence > after)?;
        events.sort_by_key(|e| e.sequence);
        events.truncate(limit);
        Ok(events)
    }

    async fn next_sequence(&self) -> Result<i64, DomainError> {
        Ok(self.sequence.load(Ordering::SeqCst) + 1)
    }
}
