//! `PostgreSQL` implementation of the `DocumentProjectionStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use masail_core::error::DomainError;
use masail_documents::read_model::{
    DocumentListQuery, DocumentPage, DocumentProjectionStore, DocumentRow, SortField, SortOrder,
};

use crate::schema::{CREATE_PROJECTION_TABLES, DOCUMENT_PROJECTION_CHECKPOINT};

const SELECT_ROW: &str = r"
    SELECT p.id, p.title, p.question, p.answer, p.prolog, p.mushoheh, p.source_document,
           p.historical_context, p.geographical_context, p.publication_date, p.is_deleted,
           p.version, p.last_sequence, p.created_at, p.updated_at,
           ARRAY(SELECT m.madhab_id FROM document_projection_madhabs m
                 WHERE m.document_id = p.id ORDER BY m.position) AS madhab_ids,
           ARRAY(SELECT c.category_id FROM document_projection_categories c
                 WHERE c.document_id = p.id ORDER BY c.position) AS category_ids
    FROM document_projection p
";

const LIST_FILTER: &str = r"
    WHERE NOT p.is_deleted
      AND ($1::uuid IS NULL OR EXISTS (
            SELECT 1 FROM document_projection_madhabs m
            WHERE m.document_id = p.id AND m.madhab_id = $1))
      AND ($2::uuid IS NULL OR EXISTS (
            SELECT 1 FROM document_projection_categories c
            WHERE c.document_id = p.id AND c.category_id = $2))
";

/// PostgreSQL-backed document projection.
#[derive(Debug, Clone)]
pub struct PgDocumentProjection {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectionRow {
    id: Uuid,
    title: String,
    question: String,
    answer: String,
    prolog: Option<String>,
    mushoheh: Option<String>,
    source_document: Option<String>,
    historical_context: Option<String>,
    geographical_context: Option<String>,
    publication_date: Option<DateTime<Utc>>,
    is_deleted: bool,
    version: i64,
    last_sequence: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    madhab_ids: Vec<Uuid>,
    category_ids: Vec<Uuid>,
}

impl From<ProjectionRow> for DocumentRow {
    fn from(row: ProjectionRow) -> Self {
        Self {
            id: row.id,
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
            last_sequence: row.last_sequence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("projection store: {err}"))
}

fn order_clause(sort_by: SortField, sort_order: SortOrder) -> &'static str {
    match (sort_by, sort_order) {
        (SortField::CreatedAt, SortOrder::Asc) => "ORDER BY p.created_at ASC, p.id ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "ORDER BY p.created_at DESC, p.id DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "ORDER BY p.updated_at ASC, p.id ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "ORDER BY p.updated_at DESC, p.id DESC",
        (SortField::Title, SortOrder::Asc) => "ORDER BY p.title ASC, p.id ASC",
        (SortField::Title, SortOrder::Desc) => "ORDER BY p.title DESC, p.id DESC",
    }
}

impl PgDocumentProjection {
    /// Creates a new `PgDocumentProjection`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the projection tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_PROJECTION_TABLES)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentProjectionStore for PgDocumentProjection {
    async fn find(&self, document_id: Uuid) -> Result<Option<DocumentRow>, DomainError> {
        let row = sqlx::query_as::<_, ProjectionRow>(&format!("{SELECT_ROW} WHERE p.id = $1"))
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(DocumentRow::from))
    }

    async fn upsert(&self, row: &DocumentRow) -> Result<bool, DomainError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let applied = sqlx::query_scalar::<_, Uuid>(
            r"
            INSERT INTO document_projection (
                id, title, question, answer, prolog, mushoheh, source_document,
                historical_context, geographical_context, publication_date, is_deleted,
                version, last_sequence, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                question = EXCLUDED.question,
                answer = EXCLUDED.answer,
                prolog = EXCLUDED.prolog,
                mushoheh = EXCLUDED.mushoheh,
                source_document = EXCLUDED.source_document,
                historical_context = EXCLUDED.historical_context,
                geographical_context = EXCLUDED.geographical_context,
                publication_date = EXCLUDED.publication_date,
                is_deleted = EXCLUDED.is_deleted,
                version = EXCLUDED.version,
                last_sequence = EXCLUDED.last_sequence,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            WHERE document_projection.version < EXCLUDED.version
            RETURNING id
            ",
        )
        .bind(row.id)
        .bind(&row.title)
        .bind(&row.question)
        .bind(&row.answer)
        .bind(&row.prolog)
        .bind(&row.mushoheh)
        .bind(&row.source_document)
        .bind(&row.historical_context)
        .bind(&row.geographical_context)
        .bind(row.publication_date)
        .bind(row.is_deleted)
        .bind(row.version)
        .bind(row.last_sequence)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        if applied.is_none() {
            tracing::debug!(document_id = %row.id, version = row.version, "projection already newer");
            return Ok(false);
        }

        sqlx::query("DELETE FROM document_projection_madhabs WHERE document_id = $1")
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        sqlx::query(
            r"
            INSERT INTO document_projection_madhabs (document_id, madhab_id, position)
            SELECT $1, t.madhab_id, t.position
            FROM UNNEST($2::uuid[]) WITH ORDINALITY AS t(madhab_id, position)
            ",
        )
        .bind(row.id)
        .bind(&row.madhab_ids)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        sqlx::query("DELETE FROM document_projection_categories WHERE document_id = $1")
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        sqlx::query(
            r"
            INSERT INTO document_projection_categories (document_id, category_id, position)
            SELECT $1, t.category_id, t.position
            FROM UNNEST($2::uuid[]) WITH ORDINALITY AS t(category_id, position)
            ",
        )
        .bind(row.id)
        .bind(&row.category_ids)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(true)
    }

    async fn list(&self, query: &DocumentListQuery) -> Result<DocumentPage, DomainError> {
        let query = query.normalized();
        let limit = i64::from(query.page_size);
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM document_projection p {LIST_FILTER}"
        ))
        .bind(query.madhab_id)
        .bind(query.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        let rows = sqlx::query_as::<_, ProjectionRow>(&format!(
            "{SELECT_ROW} {LIST_FILTER} {} LIMIT $3 OFFSET $4",
            order_clause(query.sort_by, query.sort_order)
        ))
        .bind(query.madhab_id)
        .bind(query.category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(DocumentPage {
            items: rows.into_iter().map(DocumentRow::from).collect(),
            total: u64::try_from(total).unwrap_or(0),
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn checkpoint(&self) -> Result<i64, DomainError> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM projection_checkpoints WHERE name = $1")
                .bind(DOCUMENT_PROJECTION_CHECKPOINT)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(position.unwrap_or(0))
    }

    async fn save_checkpoint(&self, position: i64) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projection_checkpoints (name, position) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET position = EXCLUDED.position
            ",
        )
        .bind(DOCUMENT_PROJECTION_CHECKPOINT)
        .bind(position)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}
