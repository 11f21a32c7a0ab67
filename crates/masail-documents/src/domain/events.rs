//! Domain events for the Document context.

use chrono::{DateTime, Utc};
use masail_core::error::DomainError;
use masail_core::event::{DomainEvent, EventMetadata};
use masail_core::repository::StoredEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fields::DocumentPatch;

/// Event type identifier for [`DocumentCreated`].
pub const DOCUMENT_CREATED_EVENT_TYPE: &str = "DocumentCreated";
/// Event type identifier for [`DocumentUpdated`].
pub const DOCUMENT_UPDATED_EVENT_TYPE: &str = "DocumentUpdated";
/// Event type identifier for [`DocumentDeleted`].
pub const DOCUMENT_DELETED_EVENT_TYPE: &str = "DocumentDeleted";
/// Event type identifier for [`MadhabAdded`].
pub const MADHAB_ADDED_EVENT_TYPE: &str = "MadhabAdded";
/// Event type identifier for [`CategoryAdded`].
pub const CATEGORY_ADDED_EVENT_TYPE: &str = "CategoryAdded";
/// Event type identifier for [`MadhabRemoved`].
pub const MADHAB_REMOVED_EVENT_TYPE: &str = "MadhabRemoved";
/// Event type identifier for [`CategoryRemoved`].
pub const CATEGORY_REMOVED_EVENT_TYPE: &str = "CategoryRemoved";

/// Every event type the Document aggregate emits.
pub const DOCUMENT_EVENT_TYPES: [&str; 7] = [
    DOCUMENT_CREATED_EVENT_TYPE,
    DOCUMENT_UPDATED_EVENT_TYPE,
    DOCUMENT_DELETED_EVENT_TYPE,
    MADHAB_ADDED_EVENT_TYPE,
    CATEGORY_ADDED_EVENT_TYPE,
    MADHAB_REMOVED_EVENT_TYPE,
    CATEGORY_REMOVED_EVENT_TYPE,
];

/// Emitted when a document is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCreated {
    /// The document identifier.
    pub document_id: Uuid,
    /// Document title.
    pub title: String,
    /// The question put to the forum.
    pub question: String,
    /// The forum's answer.
    pub answer: String,
    /// Introductory text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prolog: Option<String>,
    /// Authenticating scholars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mushoheh: Option<String>,
    /// Source document reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    /// Historical context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_context: Option<String>,
    /// Geographical context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographical_context: Option<String>,
    /// Publication date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<DateTime<Utc>>,
    /// Initial madhab tags.
    #[serde(default)]
    pub madhab_ids: Vec<Uuid>,
    /// Initial category tags.
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Emitted when whitelisted document fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdated {
    /// The document identifier.
    pub document_id: Uuid,
    /// Only the fields that changed.
    pub changes: DocumentPatch,
}

/// Emitted when a document is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDeleted {
    /// The document identifier.
    pub document_id: Uuid,
}

/// Emitted when a document is tagged with a madhab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MadhabAdded {
    /// The document identifier.
    pub document_id: Uuid,
    /// The madhab identifier.
    pub madhab_id: Uuid,
}

/// Emitted when a document is tagged with a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAdded {
    /// The document identifier.
    pub document_id: Uuid,
    /// The category identifier.
    pub category_id: Uuid,
}

/// Emitted when a madhab tag is removed from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MadhabRemoved {
    /// The document identifier.
    pub document_id: Uuid,
    /// The madhab identifier.
    pub madhab_id: Uuid,
}

/// Emitted when a category tag is removed from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRemoved {
    /// The document identifier.
    pub document_id: Uuid,
    /// The category identifier.
    pub category_id: Uuid,
}

/// Event payload variants for the Document context.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEventKind {
    /// A document has been created.
    DocumentCreated(DocumentCreated),
    /// Document fields have been updated.
    DocumentUpdated(DocumentUpdated),
    /// A document has been deleted.
    DocumentDeleted(DocumentDeleted),
    /// A madhab tag has been added.
    MadhabAdded(MadhabAdded),
    /// A category tag has been added.
    CategoryAdded(CategoryAdded),
    /// A madhab tag has been removed.
    MadhabRemoved(MadhabRemoved),
    /// A category tag has been removed.
    CategoryRemoved(CategoryRemoved),
}

fn decode<T: DeserializeOwned>(event_type: &str, payload: &serde_json::Value) -> Result<T, DomainError> {
    T::deserialize(payload).map_err(|err| {
        DomainError::Infrastructure(format!("malformed {event_type} payload: {err}"))
    })
}

impl DocumentEventKind {
    /// Returns the stored event type name of this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DocumentCreated(_) => DOCUMENT_CREATED_EVENT_TYPE,
            Self::DocumentUpdated(_) => DOCUMENT_UPDATED_EVENT_TYPE,
            Self::DocumentDeleted(_) => DOCUMENT_DELETED_EVENT_TYPE,
            Self::MadhabAdded(_) => MADHAB_ADDED_EVENT_TYPE,
            Self::CategoryAdded(_) => CATEGORY_ADDED_EVENT_TYPE,
            Self::MadhabRemoved(_) => MADHAB_REMOVED_EVENT_TYPE,
            Self::CategoryRemoved(_) => CATEGORY_REMOVED_EVENT_TYPE,
        }
    }

    /// Decodes a stored payload according to its event type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the event type is unknown or
    /// the payload does not match it.
    pub fn from_payload(event_type: &str, payload: &serde_json::Value) -> Result<Self, DomainError> {
        let kind = match event_type {
            DOCUMENT_CREATED_EVENT_TYPE => Self::DocumentCreated(decode(event_type, payload)?),
            DOCUMENT_UPDATED_EVENT_TYPE => Self::DocumentUpdated(decode(event_type, payload)?),
            DOCUMENT_DELETED_EVENT_TYPE => Self::DocumentDeleted(decode(event_type, payload)?),
            MADHAB_ADDED_EVENT_TYPE => Self::MadhabAdded(decode(event_type, payload)?),
            CATEGORY_ADDED_EVENT_TYPE => Self::CategoryAdded(decode(event_type, payload)?),
            MADHAB_REMOVED_EVENT_TYPE => Self::MadhabRemoved(decode(event_type, payload)?),
            CATEGORY_REMOVED_EVENT_TYPE => Self::CategoryRemoved(decode(event_type, payload)?),
            other => {
                return Err(DomainError::Infrastructure(format!(
                    "unknown document event type: {other}"
                )));
            }
        };
        Ok(kind)
    }
}

/// Domain event envelope for the Document context.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: DocumentEventKind,
}

impl DocumentEvent {
    /// Rebuilds a domain event from its stored record, taking version and
    /// timestamp from the log.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be decoded.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind = DocumentEventKind::from_payload(&stored.event_type, &stored.payload)?;
        Ok(Self {
            metadata: EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                aggregate_id: stored.aggregate_id,
                version: stored.version,
                correlation_id: stored.correlation_id,
                causation_id: stored.causation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        })
    }
}

impl DomainEvent for DocumentEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        let value = match &self.kind {
            DocumentEventKind::DocumentCreated(e) => serde_json::to_value(e),
            DocumentEventKind::DocumentUpdated(e) => serde_json::to_value(e),
            DocumentEventKind::DocumentDeleted(e) => serde_json::to_value(e),
            DocumentEventKind::MadhabAdded(e) => serde_json::to_value(e),
            DocumentEventKind::CategoryAdded(e) => serde_json::to_value(e),
            DocumentEventKind::MadhabRemoved(e) => serde_json::to_value(e),
            DocumentEventKind::CategoryRemoved(e) => serde_json::to_value(e),
        };
        value.expect("document event payload serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
