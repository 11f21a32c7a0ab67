//! Read model: the denormalized document projection kept beside the log.
//!
//! Rows are versioned by the aggregate version of the last event they
//! reflect. Stores apply a write only when it is newer than what they hold,
//! and deleted documents stay behind as tombstones.

mod memory;

pub use memory::InMemoryDocumentProjection;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use masail_core::aggregate::AggregateRoot;
use masail_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Document, DocumentStatus};

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a listing will honor.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One projected document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    /// Document identifier.
    pub id: Uuid,
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
    /// Tombstone flag.
    pub is_deleted: bool,
    /// Aggregate version this row reflects.
    pub version: i64,
    /// Global sequence of the event at `version`.
    pub last_sequence: i64,
    /// Timestamp of the creating event.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last applied event.
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    /// Builds the row for the current state of `document`.
    #[must_use]
    pub fn from_aggregate(document: &Document, last_sequence: i64) -> Self {
        Self {
            id: document.aggregate_id(),
            title: document.title.clone(),
            question: document.question.clone(),
            answer: document.answer.clone(),
            prolog: document.prolog.clone(),
            mushoheh: document.mushoheh.clone(),
            source_document: document.source_document.clone(),
            historical_context: document.historical_context.clone(),
            geographical_context: document.geographical_context.clone(),
            publication_date: document.publication_date,
            madhab_ids: document.madhab_ids.clone(),
            category_ids: document.category_ids.clone(),
            is_deleted: document.status == DocumentStatus::Deleted,
            version: document.version(),
            last_sequence,
            created_at: document.created_at.unwrap_or_default(),
            updated_at: document.updated_at.unwrap_or_default(),
        }
    }
}

/// Listing sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Time of the last change.
    UpdatedAt,
    /// Title, lexicographic.
    Title,
}

/// Listing sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Filters, ordering and pagination for a document listing. Tombstoned rows
/// are never listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentListQuery {
    /// Only documents tagged with this madhab.
    #[serde(default)]
    pub madhab_id: Option<Uuid>,
    /// Only documents tagged with this category.
    #[serde(default)]
    pub category_id: Option<Uuid>,
    /// Sort key.
    #[serde(default)]
    pub sort_by: SortField,
    /// Sort direction.
    #[serde(default)]
    pub sort_order: SortOrder,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for DocumentListQuery {
    fn default() -> Self {
        Self {
            madhab_id: None,
            category_id: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl DocumentListQuery {
    /// Returns a copy with `page >= 1` and `page_size` within
    /// `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            ..self.clone()
        }
    }

    /// Number of rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        let normalized = self.normalized();
        u64::from(normalized.page - 1) * u64::from(normalized.page_size)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPage {
    /// Rows on this page.
    pub items: Vec<DocumentRow>,
    /// Matching rows across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

/// Storage for the document projection and its reconciliation checkpoint.
#[async_trait]
pub trait DocumentProjectionStore: Send + Sync {
    /// Fetch a row by id, tombstones included.
    async fn find(&self, document_id: Uuid) -> Result<Option<DocumentRow>, DomainError>;

    /// Insert or replace a row. Returns `false` and leaves the stored row
    /// untouched when it already reflects `row.version` or later.
    async fn upsert(&self, row: &DocumentRow) -> Result<bool, DomainError>;

    /// List live rows.
    async fn list(&self, query: &DocumentListQuery) -> Result<DocumentPage, DomainError>;

    /// Last event sequence covered by reconciliation (0 if never run).
    async fn checkpoint(&self) -> Result<i64, DomainError>;

    /// Record the last event sequence covered by reconciliation.
    async fn save_checkpoint(&self, position: i64) -> Result<(), DomainError>;
}
