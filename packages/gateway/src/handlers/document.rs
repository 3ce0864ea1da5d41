use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::document::{IngestRequest, IngestResponse, RenderResponse};
use crate::state::AppState;

/// Fetch one document from upstream and store it unless already known.
///
/// 201 when stored, 200 when it already existed.
#[utoipa::path(
    post,
    path = "/ingest",
    tag = "Documents",
    operation_id = "forceIngest",
    summary = "Fetch and store one upstream document",
    request_body = IngestRequest,
    responses(
        (status = 201, description = "Document stored with a pending delivery entry", body = IngestResponse),
        (status = 200, description = "Document was already stored", body = IngestResponse),
        (status = 400, description = "Invalid request (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Exchange failed or has no such document (UPSTREAM_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(doc_type = %payload.doc_type, external_id = %payload.external_id))]
pub async fn force_ingest(
    State(state): State<AppState>,
    AppJson(payload): AppJson<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let external_id = payload.external_id.trim();
    if external_id.is_empty() {
        return Err(AppError::Validation("external_id must not be empty".into()));
    }

    let outcome = state
        .pipeline
        .force_ingest(payload.doc_type, external_id)
        .await?;
    let status = if outcome.is_inserted() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.into())))
}

/// Render a stored document again with the current template.
#[utoipa::path(
    post,
    path = "/{id}/render",
    tag = "Documents",
    operation_id = "rerenderDocument",
    summary = "Re-render a stored document",
    description = "Replaces the cached payload. The delivery entry is not touched.",
    params(("id" = i32, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Newly rendered payload", body = RenderResponse),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Template cannot render the document (ENCODING_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn rerender(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<RenderResponse>, AppError> {
    let rendered = state.pipeline.rerender(id).await?;
    Ok(Json(rendered.into()))
}
