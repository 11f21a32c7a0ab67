//! Query handlers for the Document context.
//!
//! Document lookups and listings read the projection. History, replay and
//! event-type scans read the event log directly.

use chrono::{DateTime, Utc};
use masail_core::error::DomainError;
use masail_core::repository::{EventRepository, StoredEvent};
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::DocumentStatus;
use crate::domain::events::DOCUMENT_EVENT_TYPES;
use crate::read_model::{
    DEFAULT_PAGE_SIZE, DocumentListQuery, DocumentProjectionStore, DocumentRow, MAX_PAGE_SIZE,
};

/// Read-only view of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    /// The document identifier.
    pub document_id: Uuid,
    /// Title.
    pub title: String,
    /// The question put to the forum.
    pub question: String,
    /// The forum's answer.
    pub answer: String,
    /// Introductory text.
    pub prolog: Option<String>,
    /// Authenticating scholars.
    pub mushoheh: Option<String>,
    /// Source document reference.
    pub source_document: Option<String>,
    /// Historical context.
    pub historical_context: Option<String>,
    /// Geographical context.
    pub geographical_context: Option<String>,
    /// Publication date.
    pub publication_date: Option<DateTime<Utc>>,
    /// Madhab tags in insertion order.
    pub madhab_ids: Vec<Uuid>,
    /// Category tags in insertion order.
    pub category_ids: Vec<Uuid>,
    /// Whether the document has been deleted.
    pub is_deleted: bool,
    /// Version of the last applied event.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for DocumentView {
    fn from(row: DocumentRow) -> Self {
        Self {
            document_id: row.id,
            title: row.title,
            question: row.question,
            answer: row.answer,
            prolog: row.prolog,
            mushoheh: row.mushoheh,
            source_document: row.source_document,
            historical_context: row.historical_context,
            geographical_context: row.geographical_context,
            publication_date: row.publication_date,
            madhab_ids: row.madhab_ids,
            category_ids: row.category_ids,
            is_deleted: row.is_deleted,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A page of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentListView {
    /// Documents on this page.
    pub items: Vec<DocumentView>,
    /// Matching documents across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

/// Read-only view of a stored event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventView {
    /// Event identifier.
    pub event_id: Uuid,
    /// Aggregate identifier.
    pub aggregate_id: Uuid,
    /// Aggregate type tag.
    pub aggregate_type: String,
    /// Event type name.
    pub event_type: String,
    /// Position in the aggregate stream.
    pub version: i64,
    /// Global log position.
    pub sequence: i64,
    /// Event payload.
    pub data: serde_json::Value,
    /// Free-form annotations.
    pub metadata: Option<serde_json::Value>,
    /// Correlation ID of the originating command.
    pub correlation_id: Uuid,
    /// Timestamp assigned by the log.
    pub timestamp: DateTime<Utc>,
}

impl From<StoredEvent> for EventView {
    fn from(event: StoredEvent) -> Self {
        Self {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            version: event.version,
            sequence: event.sequence,
            data: event.payload,
            metadata: event.metadata,
            correlation_id: event.correlation_id,
            timestamp: event.occurred_at,
        }
    }
}

/// A page of one document's event history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHistoryView {
    /// The document identifier.
    pub document_id: Uuid,
    /// Events on this page, ascending by version.
    pub events: Vec<EventView>,
    /// Total events in the stream.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

/// Retrieves a live document from the projection.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the document is unknown or
/// deleted.
pub async fn get_document(
    document_id: Uuid,
    projection: &dyn DocumentProjectionStore,
) -> Result<DocumentView, DomainError> {
    match projection.find(document_id).await? {
        Some(row) if !row.is_deleted => Ok(row.into()),
        _ => Err(DomainError::AggregateNotFound(document_id)),
    }
}

/// Lists live documents, optionally filtered by madhab or category.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the projection store fails.
pub async fn list_documents(
    query: &DocumentListQuery,
    projection: &dyn DocumentProjectionStore,
) -> Result<DocumentListView, DomainError> {
    let page = projection.list(query).await?;
    Ok(DocumentListView {
        items: page.items.into_iter().map(DocumentView::from).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    })
}

/// Retrieves a page of a document's event history from the log. Deleted
/// documents keep their history.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the log holds no events for
/// the document.
pub async fn get_document_history(
    document_id: Uuid,
    page: Option<u32>,
    page_size: Option<u32>,
    repo: &dyn EventRepository,
) -> Result<DocumentHistoryView, DomainError> {
    let events = repo.load_events(document_id).await?;
    if events.is_empty() {
        return Err(DomainError::AggregateNotFound(document_id));
    }

    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total = u64::try_from(events.len()).unwrap_or(u64::MAX);
    let skip = (page as usize - 1).saturating_mul(page_size as usize);

    Ok(DocumentHistoryView {
        document_id,
        events: events
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .map(EventView::from)
            .collect(),
        total,
        page,
        page_size,
    })
}

/// Rebuilds a document from the log alone, bypassing the projection.
///
/// Deleted documents are returned with `is_deleted` set.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the log holds no events for
/// the document, and `DomainError::Infrastructure` if the stream is corrupt.
pub async fn replay_document(
    document_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<DocumentView, DomainError> {
    let events = repo.load_events(document_id).await?;
    let Some(last) = events.last() else {
        return Err(DomainError::AggregateNotFound(document_id));
    };
    let document = command_handlers::reconstitute(document_id, &events)?;
    if document.status() == DocumentStatus::Uninitialized {
        return Err(DomainError::AggregateNotFound(document_id));
    }
    Ok(DocumentRow::from_aggregate(&document, last.sequence).into())
}

/// Lists every stored event of one document event type, ascending by
/// timestamp, optionally only those at or after `since`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `event_type` is not a document event
/// type.
pub async fn events_of_type(
    event_type: &str,
    since: Option<DateTime<Utc>>,
    repo: &dyn EventRepository,
) -> Result<Vec<EventView>, DomainError> {
    if !DOCUMENT_EVENT_TYPES.contains(&event_type) {
        return Err(DomainError::Validation(format!(
            "unknown event type {event_type}; expected one of {}",
            DOCUMENT_EVENT_TYPES.join(", ")
        )));
    }
    let events = repo.events_of_type(event_type, since).await?;
    Ok(events.into_iter().map(EventView::from).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use masail_event_store::InMemoryEventRepository;
    use masail_test_support::{FailingEventRepository, FixedClock, RecordingNotificationHook};

    use super::*;
    use crate::application::command_handlers::DocumentService;
    use crate::domain::commands::{AddCategory, CreateDocument, DeleteDocument, UpdateDocument};
    use crate::domain::events::{CATEGORY_ADDED_EVENT_TYPE, DOCUMENT_CREATED_EVENT_TYPE};
    use crate::domain::fields::DocumentPatch;
    use crate::read_model::InMemoryDocumentProjection;

    struct Fixture {
        service: DocumentService,
        events: Arc<InMemoryEventRepository>,
        projection: Arc<InMemoryDocumentProjection>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let events = Arc::new(InMemoryEventRepository::new(clock.clone()));
        let projection = Arc::new(InMemoryDocumentProjection::new());
        let service = DocumentService::new(
            clock,
            events.clone(),
            projection.clone(),
            Arc::new(RecordingNotificationHook::new()),
        );
        Fixture {
            service,
            events,
            projection,
        }
    }

    async fn create(service: &DocumentService, title: &str) -> Uuid {
        let document_id = Uuid::new_v4();
        service
            .create_document(&CreateDocument {
                correlation_id: Uuid::new_v4(),
                document_id,
                title: title.to_owned(),
                question: "Q".to_owned(),
                answer: "A".to_owned(),
                ..CreateDocument::default()
            })
            .await
            .unwrap();
        document_id
    }

    async fn delete(service: &DocumentService, document_id: Uuid) {
        service
            .delete_document(&DeleteDocument {
                correlation_id: Uuid::new_v4(),
                document_id,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_document_returns_view() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "Hukum Rokok").await;

        // Act
        let view = get_document(document_id, f.projection.as_ref()).await.unwrap();

        // Assert
        assert_eq!(view.document_id, document_id);
        assert_eq!(view.title, "Hukum Rokok");
        assert_eq!(view.version, 1);
        assert!(!view.is_deleted);
    }

    #[tokio::test]
    async fn test_get_document_returns_not_found_after_delete() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "A").await;
        delete(&f.service, document_id).await;

        // Act
        let result = get_document(document_id, f.projection.as_ref()).await;

        // Assert
        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, document_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_documents_by_category() {
        // Arrange
        let f = fixture();
        let category_id = Uuid::new_v4();
        let tagged = create(&f.service, "Tagged").await;
        create(&f.service, "Other").await;
        f.service
            .add_category(&AddCategory {
                correlation_id: Uuid::new_v4(),
                document_id: tagged,
                category_id,
            })
            .await
            .unwrap();

        // Act
        let view = list_documents(
            &DocumentListQuery {
                category_id: Some(category_id),
                ..DocumentListQuery::default()
            },
            f.projection.as_ref(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(view.total, 1);
        assert_eq!(view.items[0].document_id, tagged);
        assert_eq!(view.items[0].category_ids, vec![category_id]);
    }

    #[tokio::test]
    async fn test_history_survives_delete_and_paginates() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "A").await;
        f.service
            .update_document(&UpdateDocument {
                correlation_id: Uuid::new_v4(),
                document_id,
                changes: DocumentPatch {
                    title: Some("B".to_owned()),
                    ..DocumentPatch::default()
                },
            })
            .await
            .unwrap();
        delete(&f.service, document_id).await;

        // Act
        let first = get_document_history(document_id, None, Some(2), f.events.as_ref())
            .await
            .unwrap();
        let second = get_document_history(document_id, Some(2), Some(2), f.events.as_ref())
            .await
            .unwrap();

        // Assert
        assert_eq!(first.total, 3);
        let versions: Vec<i64> = first.events.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(first.events[0].event_type, DOCUMENT_CREATED_EVENT_TYPE);
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].version, 3);
    }

    #[tokio::test]
    async fn test_history_of_unknown_document_is_not_found() {
        let f = fixture();

        let result = get_document_history(Uuid::new_v4(), None, None, f.events.as_ref()).await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn test_replay_document_matches_projection() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "A").await;
        f.service
            .add_category(&AddCategory {
                correlation_id: Uuid::new_v4(),
                document_id,
                category_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        // Act
        let replayed = replay_document(document_id, f.events.as_ref()).await.unwrap();

        // Assert
        let projected = get_document(document_id, f.projection.as_ref()).await.unwrap();
        assert_eq!(replayed, projected);
    }

    #[tokio::test]
    async fn test_replay_document_of_deleted_document_is_flagged() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "A").await;
        delete(&f.service, document_id).await;

        // Act
        let replayed = replay_document(document_id, f.events.as_ref()).await.unwrap();

        // Assert
        assert!(replayed.is_deleted);
        assert_eq!(replayed.version, 2);
    }

    #[tokio::test]
    async fn test_events_of_type_filters_by_type() {
        // Arrange
        let f = fixture();
        let document_id = create(&f.service, "A").await;
        create(&f.service, "B").await;
        f.service
            .add_category(&AddCategory {
                correlation_id: Uuid::new_v4(),
                document_id,
                category_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        // Act
        let created = events_of_type(DOCUMENT_CREATED_EVENT_TYPE, None, f.events.as_ref())
            .await
            .unwrap();
        let added = events_of_type(CATEGORY_ADDED_EVENT_TYPE, None, f.events.as_ref())
            .await
            .unwrap();

        // Assert
        assert_eq!(created.len(), 2);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].aggregate_id, document_id);
        assert_eq!(added[0].data["document_id"], serde_json::json!(document_id));
    }

    #[tokio::test]
    async fn test_events_of_unknown_type_is_rejected_without_touching_the_log() {
        let result = events_of_type("InventoryAdded", None, &FailingEventRepository).await;

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("InventoryAdded")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
