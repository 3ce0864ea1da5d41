//! Persisted audit trail. Writing it never fails the caller.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tracing::warn;

pub use crate::entity::activity_log::AuditLevel;
use crate::entity::activity_log;

pub const INGESTED: &str = "INGESTED";
pub const DELIVERED: &str = "DELIVERED";
pub const REQUEUED: &str = "REQUEUED";
pub const RERENDERED: &str = "RERENDERED";
pub const STORE_FAILURE: &str = "STORE_FAILURE";

pub async fn record<C: ConnectionTrait>(
    conn: &C,
    level: AuditLevel,
    action: &str,
    message: impl Into<String>,
    document_id: Option<i32>,
) {
    let model = activity_log::ActiveModel {
        level: Set(level),
        action: Set(action.to_string()),
        message: Set(message.into()),
        document_id: Set(document_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Err(e) = model.insert(conn).await {
        warn!(action, error = %e, "Failed to write audit record");
    }
}
