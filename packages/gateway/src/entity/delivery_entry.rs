use common::DeliveryStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_entry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub document_id: i32,
    #[sea_orm(belongs_to, from = "document_id", to = "id")]
    pub document: HasOne<super::edi_document::Entity>,

    #[sea_orm(indexed)]
    pub status: DeliveryStatus,
    /// Failed attempts so far. Never reset.
    pub attempts: i32,

    /// `<FAILURE_KIND>: <detail>` of the last failure.
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub last_http_status: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub response_body: Option<String>,

    /// NULL means eligible immediately.
    #[sea_orm(indexed)]
    pub next_retry_at: Option<DateTimeUtc>,
    pub sent_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
