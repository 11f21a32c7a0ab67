//! Aggregate root for the Document context.

use chrono::{DateTime, Utc};
use masail_core::aggregate::AggregateRoot;
use masail_core::clock::Clock;
use masail_core::error::DomainError;
use masail_core::event::EventMetadata;
use serde::Serialize;
use uuid::Uuid;

use super::commands::CreateDocument;
use super::events::{
    CategoryAdded, CategoryRemoved, DocumentCreated, DocumentDeleted, DocumentEvent,
    DocumentEventKind, DocumentUpdated, MadhabAdded, MadhabRemoved,
};
use super::fields::DocumentPatch;

/// Lifecycle of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// No event has been applied yet.
    #[default]
    Uninitialized,
    /// Created and not deleted.
    Active,
    /// Deleted; accepts no further commands.
    Deleted,
}

/// The aggregate root for a Bahtsul Masail document.
///
/// State is a pure function of the applied events: two instances that replay
/// the same events compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Version of the last applied event.
    pub(crate) version: i64,
    pub(crate) status: DocumentStatus,
    pub(crate) title: String,
    pub(crate) question: String,
    pub(crate) answer: String,
    pub(crate) prolog: Option<String>,
    pub(crate) mushoheh: Option<String>,
    pub(crate) source_document: Option<String>,
    pub(crate) historical_context: Option<String>,
    pub(crate) geographical_context: Option<String>,
    pub(crate) publication_date: Option<DateTime<Utc>>,
    /// Madhab tags in insertion order, no duplicates.
    pub(crate) madhab_ids: Vec<Uuid>,
    /// Category tags in insertion order, no duplicates.
    pub(crate) category_ids: Vec<Uuid>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<DocumentEvent>,
}

impl Document {
    /// Creates an empty, uninitialized document.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            status: DocumentStatus::Uninitialized,
            title: String::new(),
            question: String::new(),
            answer: String::new(),
            prolog: None,
            mushoheh: None,
            source_document: None,
            historical_context: None,
            geographical_context: None,
            publication_date: None,
            madhab_ids: Vec::new(),
            category_ids: Vec::new(),
            created_at: None,
            updated_at: None,
            uncommitted_events: Vec::new(),
        }
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// Current title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current question text.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Current answer text.
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Madhab tags in insertion order.
    #[must_use]
    pub fn madhab_ids(&self) -> &[Uuid] {
        &self.madhab_ids
    }

    /// Category tags in insertion order.
    #[must_use]
    pub fn category_ids(&self) -> &[Uuid] {
        &self.category_ids
    }

    /// Creates the document, producing a `DocumentCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the document already exists or
    /// an event is pending, and `DomainError::Validation` if the fields are
    /// invalid.
    pub fn create(&mut self, command: &CreateDocument, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_no_pending_event()?;
        if self.status != DocumentStatus::Uninitialized {
            return Err(DomainError::InvalidState(format!(
                "document {} already exists",
                self.id
            )));
        }
        command.validate()?;
        let command = command.normalized();

        self.record(
            DocumentEventKind::DocumentCreated(DocumentCreated {
                document_id: self.id,
                title: command.title,
                question: command.question,
                answer: command.answer,
                prolog: command.prolog,
                mushoheh: command.mushoheh,
                source_document: command.source_document,
                historical_context: command.historical_context,
                geographical_context: command.geographical_context,
                publication_date: command.publication_date,
                madhab_ids: command.madhab_ids,
                category_ids: command.category_ids,
            }),
            command.correlation_id,
            clock,
        );
        Ok(())
    }

    /// Changes whitelisted fields, producing a `DocumentUpdated` event that
    /// carries only the changed fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the document does not
    /// exist, `DomainError::InvalidState` if it is deleted or an event is
    /// pending, and `DomainError::Validation` if the patch is invalid.
    pub fn update(
        &mut self,
        changes: &DocumentPatch,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        changes.validate()?;

        self.record(
            DocumentEventKind::DocumentUpdated(DocumentUpdated {
                document_id: self.id,
                changes: changes.normalized(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Deletes the document, producing a `DocumentDeleted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the document does not
    /// exist and `DomainError::InvalidState` if it is already deleted or an
    /// event is pending.
    pub fn delete(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active()?;

        self.record(
            DocumentEventKind::DocumentDeleted(DocumentDeleted {
                document_id: self.id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Tags the document with a madhab, producing a `MadhabAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the document does not
    /// exist and `DomainError::InvalidState` if it is deleted or an event is
    /// pending.
    pub fn add_madhab(
        &mut self,
        madhab_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;

        self.record(
            DocumentEventKind::MadhabAdded(MadhabAdded {
                document_id: self.id,
                madhab_id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Removes a madhab tag, producing a `MadhabRemoved` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the madhab is not tagged, plus the
    /// lifecycle errors of [`Document::add_madhab`].
    pub fn remove_madhab(
        &mut self,
        madhab_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        if !self.madhab_ids.contains(&madhab_id) {
            return Err(DomainError::Validation(format!(
                "madhab {madhab_id} is not tagged on document {}",
                self.id
            )));
        }

        self.record(
            DocumentEventKind::MadhabRemoved(MadhabRemoved {
                document_id: self.id,
                madhab_id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Tags the document with a category, producing a `CategoryAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the document does not
    /// exist and `DomainError::InvalidState` if it is deleted or an event is
    /// pending.
    pub fn add_category(
        &mut self,
        category_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;

        self.record(
            DocumentEventKind::CategoryAdded(CategoryAdded {
                document_id: self.id,
                category_id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Removes a category tag, producing a `CategoryRemoved` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the category is not tagged, plus
    /// the lifecycle errors of [`Document::add_category`].
    pub fn remove_category(
        &mut self,
        category_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        if !self.category_ids.contains(&category_id) {
            return Err(DomainError::Validation(format!(
                "category {category_id} is not tagged on document {}",
                self.id
            )));
        }

        self.record(
            DocumentEventKind::CategoryRemoved(CategoryRemoved {
                document_id: self.id,
                category_id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    fn ensure_no_pending_event(&self) -> Result<(), DomainError> {
        if self.uncommitted_events.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidState(format!(
                "document {} has an uncommitted event",
                self.id
            )))
        }
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        self.ensure_no_pending_event()?;
        match self.status {
            DocumentStatus::Active => Ok(()),
            DocumentStatus::Uninitialized => Err(DomainError::AggregateNotFound(self.id)),
            DocumentStatus::Deleted => Err(DomainError::InvalidState(format!(
                "document {} is deleted",
                self.id
            ))),
        }
    }

    fn record(&mut self, kind: DocumentEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = DocumentEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                version: self.version + 1,
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };

        self.uncommitted_events.push(event);
    }
}

fn insert_unique(ids: &mut Vec<Uuid>, id: Uuid) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

impl AggregateRoot for Document {
    type Event = DocumentEvent;

    const AGGREGATE_TYPE: &'static str = "Document";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            DocumentEventKind::DocumentCreated(payload) => {
                self.status = DocumentStatus::Active;
                self.title.clone_from(&payload.title);
                self.question.clone_from(&payload.question);
                self.answer.clone_from(&payload.answer);
                self.prolog.clone_from(&payload.prolog);
                self.mushoheh.clone_from(&payload.mushoheh);
                self.source_document.clone_from(&payload.source_document);
                self.historical_context.clone_from(&payload.historical_context);
                self.geographical_context
                    .clone_from(&payload.geographical_context);
                self.publication_date = payload.publication_date;
                self.madhab_ids.clear();
                self.category_ids.clear();
                for id in &payload.madhab_ids {
                    insert_unique(&mut self.madhab_ids, *id);
                }
                for id in &payload.category_ids {
                    insert_unique(&mut self.category_ids, *id);
                }
                self.created_at = Some(at);
            }
            DocumentEventKind::DocumentUpdated(payload) => {
                let changes = &payload.changes;
                if let Some(title) = &changes.title {
                    self.title.clone_from(title);
                }
                if let Some(question) = &changes.question {
                    self.question.clone_from(question);
                }
                if let Some(answer) = &changes.answer {
                    self.answer.clone_from(answer);
                }
                if let Some(prolog) = &changes.prolog {
                    self.prolog.clone_from(prolog);
                }
                if let Some(mushoheh) = &changes.mushoheh {
                    self.mushoheh.clone_from(mushoheh);
                }
                if let Some(source) = &changes.source_document {
                    self.source_document.clone_from(source);
                }
                if let Some(context) = &changes.historical_context {
                    self.historical_context.clone_from(context);
                }
                if let Some(context) = &changes.geographical_context {
                    self.geographical_context.clone_from(context);
                }
                if let Some(date) = changes.publication_date {
                    self.publication_date = date;
                }
            }
            DocumentEventKind::DocumentDeleted(_) => {
                self.status = DocumentStatus::Deleted;
            }
            DocumentEventKind::MadhabAdded(payload) => {
                insert_unique(&mut self.madhab_ids, payload.madhab_id);
            }
            DocumentEventKind::CategoryAdded(payload) => {
                insert_unique(&mut self.category_ids, payload.category_id);
            }
            DocumentEventKind::MadhabRemoved(payload) => {
                self.madhab_ids.retain(|id| *id != payload.madhab_id);
            }
            DocumentEventKind::CategoryRemoved(payload) => {
                self.category_ids.retain(|id| *id != payload.category_id);
            }
        }
        self.updated_at = Some(at);
        self.version = event.metadata.version;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use masail_core::event::DomainEvent;
    use masail_test_support::FixedClock;

    use crate::domain::events::{DOCUMENT_CREATED_EVENT_TYPE, MADHAB_ADDED_EVENT_TYPE};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn create_command(document_id: Uuid) -> CreateDocument {
        CreateDocument {
            correlation_id: Uuid::new_v4(),
            document_id,
            title: "A".to_owned(),
            question: "Q".to_owned(),
            answer: "Ans".to_owned(),
            ..CreateDocument::default()
        }
    }

    /// Applies and clears pending events the way the command handler does
    /// after a successful append.
    fn commit(document: &mut Document) -> Vec<DocumentEvent> {
        let events = document.uncommitted_events().to_vec();
        document.clear_uncommitted_events();
        for event in &events {
            document.apply(event);
        }
        events
    }

    fn created_document(document_id: Uuid) -> (Document, Vec<DocumentEvent>) {
        let mut document = Document::new(document_id);
        document
            .create(&create_command(document_id), &clock())
            .unwrap();
        let events = commit(&mut document);
        (document, events)
    }

    #[test]
    fn test_create_produces_document_created_event() {
        // Arrange
        let document_id = Uuid::new_v4();
        let command = create_command(document_id);
        let mut document = Document::new(document_id);

        // Act
        document.create(&command, &clock()).unwrap();

        // Assert
        let events = document.uncommitted_events();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.event_type(), DOCUMENT_CREATED_EVENT_TYPE);

        let meta = event.metadata();
        assert_eq!(meta.aggregate_id, document_id);
        assert_eq!(meta.version, 1);
        assert_eq!(meta.correlation_id, command.correlation_id);
        assert_eq!(meta.causation_id, command.correlation_id);
        assert_eq!(meta.occurred_at, clock().0);

        match &event.kind {
            DocumentEventKind::DocumentCreated(payload) => {
                assert_eq!(payload.document_id, document_id);
                assert_eq!(payload.title, "A");
            }
            other => panic!("expected DocumentCreated, got {other:?}"),
        }
        // Not applied until committed.
        assert_eq!(document.status(), DocumentStatus::Uninitialized);
        assert_eq!(document.version(), 0);
    }

    #[test]
    fn test_create_twice_returns_invalid_state() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);

        // Act
        let result = document.create(&create_command(document_id), &clock());

        // Assert
        match result.unwrap_err() {
            DomainError::InvalidState(msg) => assert!(msg.contains("already exists")),
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn test_create_with_blank_answer_returns_validation() {
        // Arrange
        let document_id = Uuid::new_v4();
        let command = CreateDocument {
            answer: String::new(),
            ..create_command(document_id)
        };
        let mut document = Document::new(document_id);

        // Act
        let result = document.create(&command, &clock());

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(document.uncommitted_events().is_empty());
    }

    #[test]
    fn test_commands_on_uninitialized_document_return_not_found() {
        // Arrange
        let document_id = Uuid::new_v4();
        let mut document = Document::new(document_id);
        let correlation_id = Uuid::new_v4();

        // Act
        let results = [
            document.delete(correlation_id, &clock()),
            document.add_madhab(Uuid::new_v4(), correlation_id, &clock()),
            document.add_category(Uuid::new_v4(), correlation_id, &clock()),
            document.update(
                &DocumentPatch {
                    title: Some("B".to_owned()),
                    ..DocumentPatch::default()
                },
                correlation_id,
                &clock(),
            ),
        ];

        // Assert
        for result in results {
            match result.unwrap_err() {
                DomainError::AggregateNotFound(id) => assert_eq!(id, document_id),
                other => panic!("expected AggregateNotFound, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_deleted_document_rejects_every_command() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);
        document.delete(Uuid::new_v4(), &clock()).unwrap();
        commit(&mut document);
        let version_before = document.version();

        // Act
        let results = [
            document.delete(Uuid::new_v4(), &clock()),
            document.add_madhab(Uuid::new_v4(), Uuid::new_v4(), &clock()),
            document.add_category(Uuid::new_v4(), Uuid::new_v4(), &clock()),
            document.create(&create_command(document_id), &clock()),
        ];

        // Assert
        for result in results {
            assert!(
                matches!(result, Err(DomainError::InvalidState(_))),
                "expected InvalidState, got {result:?}"
            );
        }
        assert!(document.uncommitted_events().is_empty());
        assert_eq!(document.version(), version_before);
        assert_eq!(document.status(), DocumentStatus::Deleted);
    }

    #[test]
    fn test_second_command_with_pending_event_is_rejected() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);
        document
            .add_madhab(Uuid::new_v4(), Uuid::new_v4(), &clock())
            .unwrap();

        // Act
        let result = document.add_category(Uuid::new_v4(), Uuid::new_v4(), &clock());

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
        assert_eq!(document.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_add_madhab_is_idempotent_on_apply() {
        // Arrange
        let document_id = Uuid::new_v4();
        let madhab_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);

        // Act
        document.add_madhab(madhab_id, Uuid::new_v4(), &clock()).unwrap();
        let first = commit(&mut document);
        document.add_madhab(madhab_id, Uuid::new_v4(), &clock()).unwrap();
        let second = commit(&mut document);

        // Assert
        assert_eq!(first[0].event_type(), MADHAB_ADDED_EVENT_TYPE);
        assert_eq!(second[0].metadata.version, 3);
        assert_eq!(document.madhab_ids(), &[madhab_id]);
        assert_eq!(document.version(), 3);
    }

    #[test]
    fn test_remove_category_not_tagged_returns_validation() {
        // Arrange
        let document_id = Uuid::new_v4();
        let category_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);

        // Act
        let result = document.remove_category(category_id, Uuid::new_v4(), &clock());

        // Assert
        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains(&category_id.to_string())),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_add_then_remove_tags_keeps_order_of_remaining() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let c3 = Uuid::new_v4();
        for id in [c1, c2, c3] {
            document.add_category(id, Uuid::new_v4(), &clock()).unwrap();
            commit(&mut document);
        }

        // Act
        document.remove_category(c2, Uuid::new_v4(), &clock()).unwrap();
        commit(&mut document);

        // Assert
        assert_eq!(document.category_ids(), &[c1, c3]);
        assert_eq!(document.version(), 5);
    }

    #[test]
    fn test_update_merges_only_present_fields() {
        // Arrange
        let document_id = Uuid::new_v4();
        let mut document = Document::new(document_id);
        let command = CreateDocument {
            prolog: Some("Muqaddimah".to_owned()),
            mushoheh: Some("KH. Hasyim".to_owned()),
            ..create_command(document_id)
        };
        document.create(&command, &clock()).unwrap();
        commit(&mut document);
        let patch = DocumentPatch {
            title: Some("B".to_owned()),
            prolog: Some(None),
            ..DocumentPatch::default()
        };

        // Act
        document.update(&patch, Uuid::new_v4(), &clock()).unwrap();
        let events = commit(&mut document);

        // Assert
        match &events[0].kind {
            DocumentEventKind::DocumentUpdated(payload) => {
                assert_eq!(payload.changes.changed_fields(), vec!["title", "prolog"]);
            }
            other => panic!("expected DocumentUpdated, got {other:?}"),
        }
        assert_eq!(document.title(), "B");
        assert_eq!(document.question(), "Q");
        assert_eq!(document.prolog, None);
        assert_eq!(document.mushoheh.as_deref(), Some("KH. Hasyim"));
    }

    #[test]
    fn test_empty_update_returns_validation() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, _) = created_document(document_id);

        // Act
        let result = document.update(&DocumentPatch::default(), Uuid::new_v4(), &clock());

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_replay_is_deterministic() {
        // Arrange
        let document_id = Uuid::new_v4();
        let (mut document, mut history) = created_document(document_id);
        document
            .add_madhab(Uuid::new_v4(), Uuid::new_v4(), &clock())
            .unwrap();
        history.extend(commit(&mut document));
        document.delete(Uuid::new_v4(), &clock()).unwrap();
        history.extend(commit(&mut document));

        // Act
        let mut first = Document::new(document_id);
        let mut second = Document::new(document_id);
        for event in &history {
            first.apply(event);
            second.apply(event);
        }

        // Assert
        assert_eq!(first, second);
        assert_eq!(first, document);
        assert_eq!(first.version(), 3);
    }

    #[test]
    fn test_create_add_madhab_update_replays_to_expected_state() {
        // Arrange
        let document_id = Uuid::new_v4();
        let m1 = Uuid::new_v4();
        let (mut document, mut history) = created_document(document_id);
        document.add_madhab(m1, Uuid::new_v4(), &clock()).unwrap();
        history.extend(commit(&mut document));
        let patch = DocumentPatch {
            title: Some("B".to_owned()),
            ..DocumentPatch::default()
        };
        document.update(&patch, Uuid::new_v4(), &clock()).unwrap();
        history.extend(commit(&mut document));

        // Act
        let mut replayed = Document::new(document_id);
        for event in &history {
            replayed.apply(event);
        }

        // Assert
        assert_eq!(replayed.title(), "B");
        assert_eq!(replayed.question(), "Q");
        assert_eq!(replayed.answer(), "Ans");
        assert_eq!(replayed.madhab_ids(), &[m1]);
        assert_eq!(replayed.version(), 3);
        let versions: Vec<i64> = history.iter().map(|e| e.metadata.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }
}
