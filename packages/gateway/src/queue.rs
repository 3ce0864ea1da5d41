//! Delivery queue: the only writer of `delivery_entry.status`.

use chrono::{DateTime, Utc};
use common::{DeliveryStatus, FailureKind, RetryDecision, RetryPolicy};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entity::delivery_entry;
use crate::error::{GatewayError, Result};

/// Longest response body kept on an entry.
const RESPONSE_BODY_LIMIT: usize = 4000;

/// What a failed attempt leaves behind on the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub kind: FailureKind,
    pub message: String,
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
}

pub struct DeliveryQueue<'a, C: ConnectionTrait> {
    conn: &'a C,
    policy: RetryPolicy,
}

impl<'a, C: ConnectionTrait> DeliveryQueue<'a, C> {
    pub fn new(conn: &'a C, policy: RetryPolicy) -> Self {
        Self { conn, policy }
    }

    /// Claimable entries whose retry time, if any, has come. `Pending`
    /// entries never carry one.
    fn due(now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(delivery_entry::Column::Status.is_in(statuses(DeliveryStatus::is_claimable)))
            .add(
                Condition::any()
                    .add(delivery_entry::Column::NextRetryAt.is_null())
                    .add(delivery_entry::Column::NextRetryAt.lte(now)),
            )
    }

    /// Entries the scheduler may move to `next`.
    fn moving_to(next: DeliveryStatus) -> Condition {
        Condition::all().add(
            delivery_entry::Column::Status
                .is_in(statuses(|status| status.can_transition_to(next))),
        )
    }

    pub async fn get(&self, id: i32) -> std::result::Result<Option<delivery_entry::Model>, DbErr> {
        delivery_entry::Entity::find_by_id(id).one(self.conn).await
    }

    /// Up to `limit` due entries, oldest first.
    pub async fn select_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> std::result::Result<Vec<delivery_entry::Model>, DbErr> {
        delivery_entry::Entity::find()
            .filter(Self::due(now))
            .order_by_asc(delivery_entry::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Move a due entry to `Sending`. Returns false if another worker got it
    /// first or it is no longer due.
    pub async fn claim(&self, id: i32, now: DateTime<Utc>) -> std::result::Result<bool, DbErr> {
        let res = delivery_entry::Entity::update_many()
            .col_expr(
                delivery_entry::Column::Status,
                Expr::value(DeliveryStatus::Sending),
            )
            .col_expr(delivery_entry::Column::UpdatedAt, Expr::value(now))
            .filter(delivery_entry::Column::Id.eq(id))
            .filter(Self::due(now))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// `Sending -> Sent`. The attempt counter is left alone.
    pub async fn mark_sent(
        &self,
        id: i32,
        http_status: u16,
        response_body: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<bool, DbErr> {
        let res = delivery_entry::Entity::update_many()
            .col_expr(delivery_entry::Column::Status, Expr::value(DeliveryStatus::Sent))
            .col_expr(delivery_entry::Column::SentAt, Expr::value(Some(now)))
            .col_expr(
                delivery_entry::Column::LastHttpStatus,
                Expr::value(Some(i32::from(http_status))),
            )
            .col_expr(
                delivery_entry::Column::ResponseBody,
                Expr::value(Some(truncate(response_body))),
            )
            .col_expr(delivery_entry::Column::LastError, Expr::value(None::<String>))
            .col_expr(
                delivery_entry::Column::NextRetryAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(delivery_entry::Column::UpdatedAt, Expr::value(now))
            .filter(delivery_entry::Column::Id.eq(id))
            .filter(Self::moving_to(DeliveryStatus::Sent))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// `Sending -> Error | Failed` after one failed attempt.
    pub async fn record_failure(
        &self,
        entry: &delivery_entry::Model,
        attempt: &FailedAttempt,
        now: DateTime<Utc>,
    ) -> std::result::Result<RetryDecision, DbErr> {
        let previous = u32::try_from(entry.attempts).unwrap_or(0);
        let decision = self.policy.record_failure(previous, now);

        delivery_entry::Entity::update_many()
            .col_expr(delivery_entry::Column::Status, Expr::value(decision.status()))
            .col_expr(
                delivery_entry::Column::Attempts,
                Expr::value(decision.attempts() as i32),
            )
            .col_expr(
                delivery_entry::Column::NextRetryAt,
                Expr::value(decision.next_retry_at()),
            )
            .col_expr(
                delivery_entry::Column::LastError,
                Expr::value(Some(format!("{}: {}", attempt.kind, attempt.message))),
            )
            .col_expr(
                delivery_entry::Column::LastHttpStatus,
                Expr::value(attempt.http_status.map(i32::from)),
            )
            .col_expr(
                delivery_entry::Column::ResponseBody,
                Expr::value(attempt.response_body.as_deref().map(truncate)),
            )
            .col_expr(delivery_entry::Column::UpdatedAt, Expr::value(now))
            .filter(delivery_entry::Column::Id.eq(entry.id))
            .filter(Self::moving_to(decision.status()))
            .exec(self.conn)
            .await?;

        Ok(decision)
    }

    /// Put an entry back to `Pending`, eligible immediately. The attempt
    /// counter is kept. Sent entries and entries with an attempt in flight
    /// are refused.
    pub async fn requeue(&self, id: i32, now: DateTime<Utc>) -> Result<delivery_entry::Model> {
        let entry = self
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Delivery entry {id}")))?;
        if !entry.status.is_requeueable() {
            return Err(refusal(&entry));
        }

        let res = delivery_entry::Entity::update_many()
            .col_expr(
                delivery_entry::Column::Status,
                Expr::value(DeliveryStatus::Pending),
            )
            .col_expr(
                delivery_entry::Column::NextRetryAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(delivery_entry::Column::UpdatedAt, Expr::value(now))
            .filter(delivery_entry::Column::Id.eq(id))
            .filter(
                delivery_entry::Column::Status.is_in(statuses(DeliveryStatus::is_requeueable)),
            )
            .exec(self.conn)
            .await?;

        let entry = self
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Delivery entry {id}")))?;
        if res.rows_affected == 0 {
            return Err(refusal(&entry));
        }
        Ok(entry)
    }
}

/// Every status for which `pred` holds.
fn statuses(pred: impl Fn(&DeliveryStatus) -> bool) -> Vec<DeliveryStatus> {
    DeliveryStatus::ALL.iter().copied().filter(|s| pred(s)).collect()
}

fn refusal(entry: &delivery_entry::Model) -> GatewayError {
    match entry.status {
        DeliveryStatus::Sent => GatewayError::AlreadySent(entry.id),
        _ => GatewayError::InFlight(entry.id),
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(RESPONSE_BODY_LIMIT).collect()
}
