use chrono::{DateTime, Utc};
use common::DeliveryStatus;
use serde::{Deserialize, Serialize};

use crate::entity::delivery_entry;

/// Delivery entry as seen by operators.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EntryResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = 12)]
    pub document_id: i32,
    pub status: DeliveryStatus,
    #[schema(example = 2)]
    pub attempts: i32,
    /// `<FAILURE_KIND>: <detail>` of the last failure.
    #[schema(example = "DELIVERY_REJECTED: HTTP 503")]
    pub last_error: Option<String>,
    #[schema(example = 503)]
    pub last_http_status: Option<i32>,
    #[schema(example = "2026-03-02T09:04:00Z")]
    pub next_retry_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    #[schema(example = "2026-03-02T09:00:00Z")]
    pub updated_at: DateTime<Utc>,
}

impl From<delivery_entry::Model> for EntryResponse {
    fn from(m: delivery_entry::Model) -> Self {
        Self {
            id: m.id,
            document_id: m.document_id,
            status: m.status,
            attempts: m.attempts,
            last_error: m.last_error,
            last_http_status: m.last_http_status,
            next_retry_at: m.next_retry_at,
            sent_at: m.sent_at,
            updated_at: m.updated_at,
        }
    }
}
