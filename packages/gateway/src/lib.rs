pub mod audit;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod routes;
pub mod sink;
pub mod state;
pub mod store;
pub mod templates;

use axum::{Json, routing::get};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EDI Gateway Operator API",
        version = "1.0.0",
        description = "Manual intervention on the EDI relay: retries, forced ingestion, re-rendering and wire templates"
    ),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Delivery", description = "Delivery queue intervention"),
        (name = "Documents", description = "Forced ingestion and re-rendering"),
        (name = "Templates", description = "Wire template management and preview"),
    ),
)]
struct ApiDoc;

/// Build the operator router, with the OpenAPI document served at
/// `/api-docs/openapi.json` and browsable under `/scalar`.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes())
        .split_for_parts();

    let spec = api.clone();
    router
        .with_state(state)
        .route("/api-docs/openapi.json", get(move || async move { Json(spec) }))
        .merge(Scalar::with_url("/scalar", api))
}
