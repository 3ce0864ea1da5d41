use chrono::Utc;
use codec::WireTemplate;
use common::DocType;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;

use crate::entity::wire_template;

/// Operator input for [`TemplateStore::upsert`].
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct TemplateInput {
    #[schema(example = "retail-orders")]
    pub name: String,
    #[schema(example = "<Order><Number>{{number}}</Number>{{positions}}</Order>")]
    pub body_tpl: String,
    #[serde(default)]
    pub line_tpl: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_content_type() -> String {
    codec::XML_CONTENT_TYPE.to_string()
}

fn default_active() -> bool {
    true
}

/// Read/write access to operator templates. The codec only ever sees the
/// active one through [`TemplateStore::active_for`].
pub struct TemplateStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> TemplateStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn active_for(&self, doc_type: DocType) -> Result<Option<WireTemplate>, DbErr> {
        let found = wire_template::Entity::find()
            .filter(wire_template::Column::DocType.eq(doc_type))
            .filter(wire_template::Column::IsActive.eq(true))
            .one(self.conn)
            .await?;
        Ok(found.map(Into::into))
    }

    pub async fn get(&self, doc_type: DocType) -> Result<Option<wire_template::Model>, DbErr> {
        wire_template::Entity::find()
            .filter(wire_template::Column::DocType.eq(doc_type))
            .one(self.conn)
            .await
    }

    /// Create or replace the template of `doc_type`.
    pub async fn upsert(
        &self,
        doc_type: DocType,
        input: TemplateInput,
    ) -> Result<wire_template::Model, DbErr> {
        let model = wire_template::ActiveModel {
            doc_type: Set(doc_type),
            name: Set(input.name),
            body_tpl: Set(input.body_tpl),
            line_tpl: Set(input.line_tpl),
            content_type: Set(input.content_type),
            is_active: Set(input.is_active),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        wire_template::Entity::insert(model)
            .on_conflict(
                OnConflict::column(wire_template::Column::DocType)
                    .update_columns([
                        wire_template::Column::Name,
                        wire_template::Column::BodyTpl,
                        wire_template::Column::LineTpl,
                        wire_template::Column::ContentType,
                        wire_template::Column::IsActive,
                        wire_template::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await?;

        self.get(doc_type)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("wire_template {doc_type}")))
    }

    /// Returns false when `doc_type` has no template.
    pub async fn set_active(&self, doc_type: DocType, active: bool) -> Result<bool, DbErr> {
        let res = wire_template::Entity::update_many()
            .col_expr(wire_template::Column::IsActive, Expr::value(active))
            .col_expr(wire_template::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(wire_template::Column::DocType.eq(doc_type))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn list(&self) -> Result<Vec<wire_template::Model>, DbErr> {
        wire_template::Entity::find()
            .order_by_asc(wire_template::Column::DocType)
            .all(self.conn)
            .await
    }
}
