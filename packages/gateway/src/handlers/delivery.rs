use axum::{
    Json,
    extract::{Path, State},
};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::models::delivery::EntryResponse;
use crate::pipeline::DeliveryOutcome;
use crate::state::AppState;

/// Requeue an entry and attempt delivery right away.
///
/// 409 `CONFLICT` if the entry was already sent or an attempt is in flight.
/// The response carries the entry state after the attempt.
#[utoipa::path(
    post,
    path = "/{id}/retry",
    tag = "Delivery",
    operation_id = "retryEntry",
    summary = "Retry a delivery entry now",
    description = "Puts a `Pending`, `Error` or `Failed` entry back to `Pending` and delivers it immediately. The attempt counter is kept.",
    params(("id" = i32, Path, description = "Delivery entry ID")),
    responses(
        (status = 200, description = "Entry after the attempt", body = EntryResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Entry already sent or in flight (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn retry_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EntryResponse>, AppError> {
    let outcome = state.pipeline.retry_now(id).await?;
    if let DeliveryOutcome::Failed(decision) = outcome {
        info!(entry_id = id, status = %decision.status(), "Manual retry failed");
    }

    let entry = state
        .pipeline
        .entry(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery entry {id} not found")))?;
    Ok(Json(entry.into()))
}
