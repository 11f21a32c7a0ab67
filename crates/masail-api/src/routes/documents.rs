//! Routes for the Document bounded context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use masail_documents::application::command_handlers::{DocumentCommandResult, ProjectionStatus};
use masail_documents::application::query_handlers::{
    self, DocumentHistoryView, DocumentListView, DocumentView,
};
use masail_documents::domain::commands;
use masail_documents::domain::fields::DocumentPatch;
use masail_documents::read_model::DocumentListQuery;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /documents.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    /// Client-chosen identifier. Generated when absent.
    #[serde(default)]
    pub document_id: Option<Uuid>,
    /// Document title.
    pub title: String,
    /// The question under deliberation.
    pub question: String,
    /// The ruling.
    pub answer: String,
    /// Introductory text.
    #[serde(default)]
    pub prolog: Option<String>,
    /// Who ratified the ruling.
    #[serde(default)]
    pub mushoheh: Option<String>,
    /// Source reference.
    #[serde(default)]
    pub source_document: Option<String>,
    /// Historical background.
    #[serde(default)]
    pub historical_context: Option<String>,
    /// Geographical background.
    #[serde(default)]
    pub geographical_context: Option<String>,
    /// When the ruling was published.
    #[serde(default)]
    pub publication_date: Option<DateTime<Utc>>,
    /// Initial madhab tags.
    #[serde(default)]
    pub madhab_ids: Vec<Uuid>,
    /// Initial category tags.
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Request body for POST /documents/{id}/madhabs.
#[derive(Debug, Deserialize)]
pub struct AddMadhabRequest {
    /// The madhab to tag the document with.
    pub madhab_id: Uuid,
}

/// Request body for POST /documents/{id}/categories.
#[derive(Debug, Deserialize)]
pub struct AddCategoryRequest {
    /// The category to tag the document with.
    pub category_id: Uuid,
}

/// Query parameters for GET /documents/{id}/history.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Events per page.
    pub page_size: Option<u32>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The document the command targeted.
    pub aggregate_id: Uuid,
    /// ID of the event appended to the log.
    pub event_id: Uuid,
    /// Type of the event appended to the log.
    pub event_type: String,
    /// Document version after the event.
    pub version: i64,
    /// Global sequence of the event.
    pub sequence: i64,
    /// Whether the read model reflects the event yet.
    pub projection_synced: bool,
    /// Why the read model write failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_error: Option<String>,
}

impl From<DocumentCommandResult> for CommandResponse {
    fn from(result: DocumentCommandResult) -> Self {
        let projection_error = match result.projection {
            ProjectionStatus::Synced => None,
            ProjectionStatus::Stale { reason } => Some(reason),
        };
        Self {
            aggregate_id: result.aggregate_id,
            event_id: result.stored_event.event_id,
            event_type: result.stored_event.event_type,
            version: result.stored_event.version,
            sequence: result.stored_event.sequence,
            projection_synced: projection_error.is_none(),
            projection_error,
        }
    }
}

/// POST /documents
#[instrument(skip(state, request))]
async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::CreateDocument {
        correlation_id: Uuid::new_v4(),
        document_id: request.document_id.unwrap_or_else(Uuid::new_v4),
        title: request.title,
        question: request.question,
        answer: request.answer,
        prolog: request.prolog,
        mushoheh: request.mushoheh,
        source_document: request.source_document,
        historical_context: request.historical_context,
        geographical_context: request.geographical_context,
        publication_date: request.publication_date,
        madhab_ids: request.madhab_ids,
        category_ids: request.category_ids,
    };

    info!(
        correlation_id = %command.correlation_id,
        document_id = %command.document_id,
        "handling create_document command"
    );

    let result = state.documents.create_document(&command).await?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// PATCH /documents/{id}
#[instrument(skip(state, changes))]
async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(changes): Json<DocumentPatch>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::UpdateDocument {
        correlation_id: Uuid::new_v4(),
        document_id,
        changes,
    };

    info!(correlation_id = %command.correlation_id, "handling update_document command");

    let result = state.documents.update_document(&command).await?;
    Ok(Json(result.into()))
}

/// DELETE /documents/{id}
#[instrument(skip(state))]
async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DeleteDocument {
        correlation_id: Uuid::new_v4(),
        document_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_document command");

    let result = state.documents.delete_document(&command).await?;
    Ok(Json(result.into()))
}

/// POST /documents/{id}/madhabs
#[instrument(skip(state, request), fields(madhab_id = %request.madhab_id))]
async fn add_madhab(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<AddMadhabRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AddMadhab {
        correlation_id: Uuid::new_v4(),
        document_id,
        madhab_id: request.madhab_id,
    };

    info!(correlation_id = %command.correlation_id, "handling add_madhab command");

    let result = state.documents.add_madhab(&command).await?;
    Ok(Json(result.into()))
}

/// DELETE /documents/{id}/madhabs/{madhab_id}
#[instrument(skip(state))]
async fn remove_madhab(
    State(state): State<AppState>,
    Path((document_id, madhab_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RemoveMadhab {
        correlation_id: Uuid::new_v4(),
        document_id,
        madhab_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_madhab command");

    let result = state.documents.remove_madhab(&command).await?;
    Ok(Json(result.into()))
}

/// POST /documents/{id}/categories
#[instrument(skip(state, request), fields(category_id = %request.category_id))]
async fn add_category(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<AddCategoryRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AddCategory {
        correlation_id: Uuid::new_v4(),
        document_id,
        category_id: request.category_id,
    };

    info!(correlation_id = %command.correlation_id, "handling add_category command");

    let result = state.documents.add_category(&command).await?;
    Ok(Json(result.into()))
}

/// DELETE /documents/{id}/categories/{category_id}
#[instrument(skip(state))]
async fn remove_category(
    State(state): State<AppState>,
    Path((document_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RemoveCategory {
        correlation_id: Uuid::new_v4(),
        document_id,
        category_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_category command");

    let result = state.documents.remove_category(&command).await?;
    Ok(Json(result.into()))
}

/// GET /documents
#[instrument(skip(state))]
async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<DocumentListView>, ApiError> {
    let view = query_handlers::list_documents(&query, state.projection.as_ref()).await?;
    Ok(Json(view))
}

/// GET /documents/{id}
#[instrument(skip(state))]
async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentView>, ApiError> {
    let view = query_handlers::get_document(document_id, state.projection.as_ref()).await?;
    Ok(Json(view))
}

/// GET /documents/{id}/history
#[instrument(skip(state))]
async fn get_document_history(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<DocumentHistoryView>, ApiError> {
    let view = query_handlers::get_document_history(
        document_id,
        params.page,
        params.page_size,
        state.event_repository.as_ref(),
    )
    .await?;
    Ok(Json(view))
}

/// GET /documents/{id}/replay
#[instrument(skip(state))]
async fn replay_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentView>, ApiError> {
    let view =
        query_handlers::replay_document(document_id, state.event_repository.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for the document context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", post(create_document).get(list_documents))
        .route(
            "/documents/{id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route("/documents/{id}/history", get(get_document_history))
        .route("/documents/{id}/replay", get(replay_document))
        .route("/documents/{id}/madhabs", post(add_madhab))
        .route("/documents/{id}/madhabs/{madhab_id}", delete(remove_madhab))
        .route("/documents/{id}/categories", post(add_category))
        .route(
            "/documents/{id}/categories/{category_id}",
            delete(remove_category),
        )
}
