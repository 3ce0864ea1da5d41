use chrono::{DateTime, Utc};
use codec::Rendered;
use common::{CanonicalDocument, DeliveryStatus};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionSession, TransactionTrait,
};
use tracing::debug;

use crate::entity::{delivery_entry, edi_document};

/// Result of [`DocumentStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New document and its `Pending` delivery entry were committed together.
    Inserted { document_id: i32, entry_id: i32 },
    /// A document with the same external id or flow id already exists.
    AlreadyExists { document_id: i32 },
}

impl IngestOutcome {
    pub fn document_id(&self) -> i32 {
        match self {
            Self::Inserted { document_id, .. } | Self::AlreadyExists { document_id } => *document_id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

/// Owner of `edi_document` rows.
pub struct DocumentStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DocumentStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Rows matching any identity of `doc`.
    fn identity_condition(doc: &CanonicalDocument) -> Condition {
        let mut cond =
            Condition::any().add(edi_document::Column::ExternalId.eq(doc.external_id.as_str()));
        if let Some(flow_id) = &doc.flow_id {
            cond = cond.add(edi_document::Column::FlowId.eq(flow_id.as_str()));
        }
        cond
    }

    pub async fn find_existing(
        &self,
        doc: &CanonicalDocument,
    ) -> Result<Option<edi_document::Model>, DbErr> {
        edi_document::Entity::find()
            .filter(Self::identity_condition(doc))
            .one(self.conn)
            .await
    }

    pub async fn get(&self, id: i32) -> Result<Option<edi_document::Model>, DbErr> {
        edi_document::Entity::find_by_id(id).one(self.conn).await
    }

    /// Store `doc` and its delivery entry unless either identity is known.
    pub async fn insert_if_absent(
        &self,
        doc: &CanonicalDocument,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, DbErr>
    where
        C: TransactionTrait,
    {
        if let Some(existing) = self.find_existing(doc).await? {
            return Ok(IngestOutcome::AlreadyExists {
                document_id: existing.id,
            });
        }
        self.insert(doc, now).await
    }

    /// Store `doc` and its `Pending` delivery entry in one transaction.
    ///
    /// An identity already taken, for instance by a concurrent insert, loses
    /// on the unique constraint and reports `AlreadyExists` instead of an
    /// error.
    pub async fn insert(
        &self,
        doc: &CanonicalDocument,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, DbErr>
    where
        C: TransactionTrait,
    {
        let txn = self.conn.begin().await?;

        let model = document_model(doc, now)?;
        let inserted = edi_document::Entity::insert(model)
            .on_conflict(
                OnConflict::column(edi_document::Column::ExternalId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&txn)
            .await;

        let document_id = match inserted {
            Ok(res) => res.last_insert_id,
            Err(e) if is_duplicate(&e) => {
                txn.rollback().await?;
                debug!(external_id = %doc.external_id, "Lost insert race, document already stored");
                let existing = self.find_existing(doc).await?.ok_or_else(|| {
                    DbErr::Custom("Duplicate document but existing row not found".to_string())
                })?;
                return Ok(IngestOutcome::AlreadyExists {
                    document_id: existing.id,
                });
            }
            Err(e) => return Err(e),
        };

        let entry = delivery_entry::ActiveModel {
            document_id: Set(document_id),
            status: Set(DeliveryStatus::Pending),
            attempts: Set(0),
            last_error: Set(None),
            last_http_status: Set(None),
            response_body: Set(None),
            next_retry_at: Set(None),
            sent_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let entry_id = delivery_entry::Entity::insert(entry)
            .exec(&txn)
            .await?
            .last_insert_id;

        txn.commit().await?;

        Ok(IngestOutcome::Inserted {
            document_id,
            entry_id,
        })
    }

    /// Cache `rendered` on the document, replacing any previous rendering.
    pub async fn set_rendered(
        &self,
        document_id: i32,
        rendered: &Rendered,
        now: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let res = edi_document::Entity::update_many()
            .col_expr(
                edi_document::Column::RenderedPayload,
                Expr::value(Some(rendered.body.clone())),
            )
            .col_expr(
                edi_document::Column::RenderedContentType,
                Expr::value(Some(rendered.content_type.clone())),
            )
            .col_expr(edi_document::Column::RenderedAt, Expr::value(Some(now)))
            .filter(edi_document::Column::Id.eq(document_id))
            .exec(self.conn)
            .await?;

        if res.rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!("edi_document {document_id}")));
        }
        Ok(())
    }
}

fn is_duplicate(e: &DbErr) -> bool {
    matches!(e, DbErr::RecordNotInserted)
        || matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn document_model(
    doc: &CanonicalDocument,
    now: DateTime<Utc>,
) -> Result<edi_document::ActiveModel, DbErr> {
    // The raw payload has its own column.
    let mut canonical = serde_json::to_value(doc).map_err(|e| DbErr::Json(e.to_string()))?;
    if let Some(map) = canonical.as_object_mut() {
        map.remove("rawPayload");
    }

    Ok(edi_document::ActiveModel {
        external_id: Set(doc.external_id.clone()),
        flow_id: Set(doc.flow_id.clone()),
        doc_type: Set(doc.doc_type),
        number: Set(doc.number.clone()),
        doc_date: Set(doc.date),
        supplier_id: Set(doc.supplier_id.clone()),
        buyer_id: Set(doc.buyer_id.clone()),
        supplier_name: Set(doc.supplier_name.clone()),
        buyer_name: Set(doc.buyer_name.clone()),
        currency: Set(doc.currency.clone()),
        document: Set(canonical),
        raw_payload: Set(doc.raw_payload.clone()),
        rendered_payload: Set(None),
        rendered_content_type: Set(None),
        rendered_at: Set(None),
        received_at: Set(now),
        ..Default::default()
    })
}

/// Rebuild the canonical document of a stored row.
pub fn to_canonical(model: &edi_document::Model) -> Result<CanonicalDocument, DbErr> {
    let mut value = model.document.clone();
    if let Some(map) = value.as_object_mut() {
        map.insert("rawPayload".into(), model.raw_payload.clone());
    }
    serde_json::from_value(value).map_err(|e| DbErr::Json(e.to_string()))
}

/// Cached rendering of a stored row, if any.
pub fn cached_rendering(model: &edi_document::Model) -> Option<Rendered> {
    let body = model.rendered_payload.clone()?;
    let content_type = model
        .rendered_content_type
        .clone()
        .unwrap_or_else(|| codec::XML_CONTENT_TYPE.to_string());
    Some(Rendered { body, content_type })
}
