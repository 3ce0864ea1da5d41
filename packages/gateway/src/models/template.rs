use chrono::{DateTime, Utc};
use codec::WireTemplate;
use common::DocType;
use serde::{Deserialize, Serialize};

use crate::entity::wire_template;

/// Template draft to render against sample data. Without `body_tpl` the
/// built-in encoder of `doc_type` is previewed.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PreviewRequest {
    pub doc_type: DocType,
    #[schema(example = "<Order><Number>{{number}}</Number>{{positions}}</Order>")]
    pub body_tpl: Option<String>,
    #[serde(default)]
    pub line_tpl: String,
    pub content_type: Option<String>,
}

impl PreviewRequest {
    pub fn template(&self) -> Option<WireTemplate> {
        let body = self.body_tpl.as_ref()?;
        let tpl = WireTemplate::new(body.clone(), self.line_tpl.clone());
        Some(match &self.content_type {
            Some(ct) => tpl.with_content_type(ct.clone()),
            None => tpl,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TemplateResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub doc_type: DocType,
    #[schema(example = "retail-orders")]
    pub name: String,
    pub body_tpl: String,
    pub line_tpl: String,
    pub content_type: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<wire_template::Model> for TemplateResponse {
    fn from(m: wire_template::Model) -> Self {
        Self {
            id: m.id,
            doc_type: m.doc_type,
            name: m.name,
            body_tpl: m.body_tpl,
            line_tpl: m.line_tpl,
            content_type: m.content_type,
            is_active: m.is_active,
            updated_at: m.updated_at,
        }
    }
}
