use utoipa_axum::{router::OpenApiRouter, routes};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::health))
        .nest("/entries", entry_routes())
        .nest("/documents", document_routes())
        .nest("/templates", template_routes())
}

fn entry_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::delivery::retry_entry))
}

fn document_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::document::force_ingest))
        .routes(routes!(handlers::document::rerender))
}

fn template_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::template::list_templates))
        .routes(routes!(handlers::template::preview_template))
        .routes(routes!(handlers::template::put_template))
}
