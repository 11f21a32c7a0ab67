//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use masail_core::error::DomainError;
use masail_core::repository::{EventRepository, NewEvent, StoredEvent};

use crate::schema::{AGGREGATE_VERSION_CONSTRAINT, CREATE_EVENT_STORE_TABLE};

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    event_type: String,
    payload: serde_json::Value,
    metadata: Option<serde_json::Value>,
    version: i64,
    sequence: i64,
    correlation_id: Uuid,
    causation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            event_type: row.event_type,
            payload: row.payload,
            metadata: row.metadata,
            version: row.version,
            sequence: row.sequence,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
        }
    }
}

fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("event store: {err}"))
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the event log table, indexes and append-only trigger if they
    /// do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_EVENT_STORE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.load_events_after(aggregate_id, 0).await
    }

    async fn load_events_after(
        &self,
        aggregate_id: Uuid,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT event_id, aggregate_id, aggregate_type, event_type, payload, metadata,
                   version, sequence, correlation_id, causation_id, occurred_at
            FROM event_store
            WHERE aggregate_id = $1 AND version > $2
            ORDER BY version
            ",
        )
        .bind(aggregate_id)
        .bind(after_version)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
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
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let actual: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM event_store WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let version = expected_version + 1;
        let inserted = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r"
            INSERT INTO event_store (
                event_id, aggregate_id, aggregate_type, event_type, version,
                payload, metadata, correlation_id, causation_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING sequence, occurred_at
            ",
        )
        .bind(event.event_id)
        .bind(aggregate_id)
        .bind(&event.aggregate_type)
        .bind(&event.event_type)
        .bind(version)
        .bind(&event.payload)
        .bind(&event.metadata)
        .bind(event.correlation_id)
        .bind(event.causation_id)
        .fetch_one(&mut *tx)
        .await;

        let (sequence, occurred_at) = match inserted {
            Ok(row) => row,
            // A concurrent writer committed the same version between our
            // read and our insert.
            Err(sqlx::Error::Database(db))
                if db.constraint() == Some(AGGREGATE_VERSION_CONSTRAINT) =>
            {
                drop(tx);
                let actual = self.latest_version(aggregate_id).await?;
                tracing::debug!(%aggregate_id, expected_version, actual, "append lost version race");
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual,
                });
            }
            Err(err) => return Err(storage_error(err)),
        };

        tx.commit().await.map_err(storage_error)?;

        Ok(StoredEvent::from_new(event, version, sequence, occurred_at))
    }

    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM event_store WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn events_of_type(
        &self,
        event_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT event_id, aggregate_id, aggregate_type, event_type, payload, metadata,
                   version, sequence, correlation_id, causation_id, occurred_at
            FROM event_store
            WHERE event_type = $1 AND ($2::timestamptz IS NULL OR occurred_at >= $2)
            ORDER BY occurred_at, sequence
            ",
        )
        .bind(event_type)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn events_after_sequence(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT event_id, aggregate_id, aggregate_type, event_type, payload, metadata,
                   version, sequence, correlation_id, causation_id, occurred_at
            FROM event_store
            WHERE sequence > $1
            ORDER BY sequence
            LIMIT $2
            ",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn next_sequence(&self) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COALESCE(MAX(sequence), 0) + 1 FROM event_store")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }
}
