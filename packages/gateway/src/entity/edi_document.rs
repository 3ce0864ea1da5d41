use common::DocType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ingested upstream document. Rows are never re-inserted; a re-fetched
/// document under a known identity leaves the existing row untouched.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "edi_document")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub external_id: String,
    /// Conversation identity, when the exchange exposes one.
    #[sea_orm(unique, nullable)]
    pub flow_id: Option<String>,

    #[sea_orm(indexed)]
    pub doc_type: DocType,
    pub number: String,
    pub doc_date: Option<Date>,
    pub supplier_id: String,
    pub buyer_id: String,
    pub supplier_name: String,
    pub buyer_name: String,
    pub currency: String,

    /// Canonical document as JSON, without the raw payload.
    #[sea_orm(column_type = "JsonBinary")]
    pub document: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub raw_payload: serde_json::Value,

    /// Cached wire payload. Reused verbatim on every retry once set.
    #[sea_orm(column_type = "Text", nullable)]
    pub rendered_payload: Option<String>,
    pub rendered_content_type: Option<String>,
    pub rendered_at: Option<DateTimeUtc>,

    #[sea_orm(has_one)]
    pub delivery: HasOne<super::delivery_entry::Entity>,

    pub received_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
