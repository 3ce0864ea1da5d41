use codec::Rendered;
use common::DocType;
use serde::{Deserialize, Serialize};

use crate::store::IngestOutcome;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct IngestRequest {
    pub doc_type: DocType,
    /// Upstream document id.
    #[schema(example = "a1b2c3d4")]
    pub external_id: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IngestResponse {
    #[schema(example = 12)]
    pub document_id: i32,
    /// False when the document was already stored.
    #[schema(example = true)]
    pub inserted: bool,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            document_id: outcome.document_id(),
            inserted: outcome.is_inserted(),
        }
    }
}

/// An encoded payload, from a re-render or a template preview.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RenderResponse {
    #[schema(example = "application/xml")]
    pub content_type: String,
    pub body: String,
}

impl From<Rendered> for RenderResponse {
    fn from(r: Rendered) -> Self {
        Self {
            content_type: r.content_type,
            body: r.body,
        }
    }
}
