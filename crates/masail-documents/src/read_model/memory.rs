//! In-memory `DocumentProjectionStore`, used when no database is configured
//! and in tests.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use masail_core::error::DomainError;
use uuid::Uuid;

use super::{DocumentListQuery, DocumentPage, DocumentProjectionStore, DocumentRow, SortField, SortOrder};

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::Infrastructure("projection lock poisoned".into())
}

/// Projection rows held in a map keyed by document id.
#[derive(Debug, Default)]
pub struct InMemoryDocumentProjection {
    rows: RwLock<HashMap<Uuid, DocumentRow>>,
    checkpoint: AtomicI64,
}

impl InMemoryDocumentProjection {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &DocumentRow, b: &DocumentRow, field: SortField) -> CmpOrdering {
    let primary = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl DocumentProjectionStore for InMemoryDocumentProjection {
    async fn find(&self, document_id: Uuid) -> Result<Option<DocumentRow>, DomainError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&document_id).cloned())
    }

    async fn upsert(&self, row: &DocumentRow) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows
            .get(&row.id)
            .is_some_and(|stored| stored.version >= row.version)
        {
            return Ok(false);
        }
        rows.insert(row.id, row.clone());
        Ok(true)
    }

    async fn list(&self, query: &DocumentListQuery) -> Result<DocumentPage, DomainError> {
        let query = query.normalized();
        let rows = self.rows.read().map_err(poisoned)?;

        let mut matching: Vec<&DocumentRow> = rows
            .values()
            .filter(|row| !row.is_deleted)
            .filter(|row| query.madhab_id.is_none_or(|id| row.madhab_ids.contains(&id)))
            .filter(|row| {
                query
                    .category_id
                    .is_none_or(|id| row.category_ids.contains(&id))
            })
            .collect();
        matching.sort_by(|a, b| match query.sort_order {
            SortOrder::Asc => compare(a, b, query.sort_by),
            SortOrder::Desc => compare(b, a, query.sort_by),
        });

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok(DocumentPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn checkpoint(&self) -> Result<i64, DomainError> {
        Ok(self.checkpoint.load(Ordering::SeqCst))
    }

    async fn save_checkpoint(&self, position: i64) -> Result<(), DomainError> {
        self.checkpoint.store(position, Ordering::SeqCst);
        Ok(())
    }
}
