//! Event repository abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// An event ready to be appended; the log assigns version, sequence and
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type tag.
    pub aggregate_type: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Optional free-form annotations.
    pub metadata: Option<serde_json::Value>,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type tag.
    pub aggregate_type: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Optional free-form annotations.
    pub metadata: Option<serde_json::Value>,
    /// Position within the aggregate stream, starting at 1.
    pub version: i64,
    /// Global, monotonically increasing append counter.
    pub sequence: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp assigned by the log at append time.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Builds the stored record for `event` at the given position.
    #[must_use]
    pub fn from_new(
        event: NewEvent,
        version: i64,
        sequence: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            payload: event.payload,
            metadata: event.metadata,
            version,
            sequence,
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
            occurred_at,
        }
    }
}

/// Repository trait for the append-only event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a given aggregate, ordered by version.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the events of an aggregate with a version greater than
    /// `after_version`, ordered by version.
    async fn load_events_after(
        &self,
        aggregate_id: Uuid,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append one event with optimistic concurrency.
    ///
    /// Fails with `DomainError::ConcurrencyConflict` unless the latest stored
    /// version of the aggregate equals `expected_version`. On success the
    /// event is stored at `expected_version + 1` with the next global sequence.
    async fn append_event(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<StoredEvent, DomainError>;

    /// Latest stored version of an aggregate, 0 if it has no events.
    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError>;

    /// All events of one type, ordered by timestamp, optionally only those
    /// at or after `since`.
    async fn events_of_type(
        &self,
        event_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Up to `limit` events with a sequence greater than `after`, ordered by
    /// sequence.
    async fn events_after_sequence(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// The sequence the next append would receive. Diagnostic only; nothing
    /// is reserved.
    async fn next_sequence(&self) -> Result<i64, DomainError>;
}
