use codec::WireTemplate;
use common::DocType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operator-edited wire template, at most one per document type.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wire_template")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub doc_type: DocType,
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub body_tpl: String,
    /// Rendered once per line into `{{positions}}`.
    #[sea_orm(column_type = "Text")]
    pub line_tpl: String,
    pub content_type: String,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for WireTemplate {
    fn from(m: Model) -> Self {
        WireTemplate {
            body: m.body_tpl,
            line: m.line_tpl,
            content_type: m.content_type,
        }
    }
}
