use axum::{
    Json,
    extract::{Path, State},
};
use common::DocType;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::document::RenderResponse;
use crate::models::template::{PreviewRequest, TemplateResponse};
use crate::state::AppState;
use crate::templates::{TemplateInput, TemplateStore};

/// Every stored template, active or not.
#[utoipa::path(
    get,
    path = "/",
    tag = "Templates",
    operation_id = "listTemplates",
    summary = "List wire templates",
    responses(
        (status = 200, description = "Stored templates", body = Vec<TemplateResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let templates = TemplateStore::new(&state.db).list().await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

/// Create or replace the template of one document type.
#[utoipa::path(
    put,
    path = "/{doc_type}",
    tag = "Templates",
    operation_id = "putTemplate",
    summary = "Create or replace a wire template",
    params(("doc_type" = String, Path, description = "Document type code", example = "ORDER")),
    request_body = TemplateInput,
    responses(
        (status = 200, description = "Saved template", body = TemplateResponse),
        (status = 400, description = "Unknown document type or invalid template (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn put_template(
    State(state): State<AppState>,
    Path(doc_type): Path<String>,
    AppJson(payload): AppJson<TemplateInput>,
) -> Result<Json<TemplateResponse>, AppError> {
    let doc_type = doc_type
        .parse::<DocType>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if payload.is_active && payload.body_tpl.trim().is_empty() {
        return Err(AppError::Validation(
            "An active template needs a non-empty body_tpl".into(),
        ));
    }

    let saved = TemplateStore::new(&state.db)
        .upsert(doc_type, payload)
        .await?;
    info!(doc_type = %doc_type, active = saved.is_active, "Template saved");
    Ok(Json(saved.into()))
}

/// Render a draft template (or the built-in encoder) against sample data.
#[utoipa::path(
    post,
    path = "/preview",
    tag = "Templates",
    operation_id = "previewTemplate",
    summary = "Preview a template against sample data",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Rendered sample", body = RenderResponse),
        (status = 400, description = "Invalid request (VALIDATION_ERROR)", body = ErrorBody),
        (status = 422, description = "Template cannot render the sample (ENCODING_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(doc_type = %payload.doc_type))]
pub async fn preview_template(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PreviewRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    let template = payload.template();
    let rendered = state
        .pipeline
        .preview_template(payload.doc_type, template.as_ref())?;
    Ok(Json(rendered.into()))
}
