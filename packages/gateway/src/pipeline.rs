//! The orchestrator: one cycle is a fetch phase followed by a delivery phase.
//! Each document and each entry is handled on its own; one failure is logged
//! and audited, then the cycle moves on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use codec::{Rendered, WireTemplate};
use common::{DocType, FailureKind, RetryDecision, RetryPolicy};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use upstream::UpstreamSource;

use crate::audit::{self, AuditLevel};
use crate::config::AppConfig;
use crate::entity::{delivery_entry, edi_document};
use crate::error::{GatewayError, Result};
use crate::notify::{FailureNotifier, Notification, dispatch};
use crate::queue::{DeliveryQueue, FailedAttempt};
use crate::sink::DownstreamSink;
use crate::store::{DocumentStore, IngestOutcome, cached_rendering, to_canonical};
use crate::templates::TemplateStore;

/// Knobs of the orchestrator, taken from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub lookback_days: u32,
    pub batch_size: u64,
    pub retry_policy: RetryPolicy,
    pub poll_interval: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lookback_days: config.upstream.lookback_days(),
            batch_size: config.delivery.batch_size.max(1),
            retry_policy: config.delivery.retry_policy(),
            poll_interval: Duration::from_secs(config.pipeline.poll_interval_secs.max(1)),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            batch_size: 20,
            retry_policy: RetryPolicy::default(),
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Counters of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    /// Upstream items or document types that could not be fetched.
    pub fetch_failures: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub ingest_errors: usize,
    pub sent: usize,
    pub failed_attempts: usize,
    pub skipped: usize,
}

/// Result of one delivery attempt on one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { http_status: u16 },
    Failed(RetryDecision),
    /// The entry was claimed elsewhere or is no longer due.
    Skipped,
}

pub struct Pipeline {
    db: DatabaseConnection,
    source: Arc<dyn UpstreamSource>,
    sink: Arc<dyn DownstreamSink>,
    notifier: Arc<dyn FailureNotifier>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        db: DatabaseConnection,
        source: Arc<dyn UpstreamSource>,
        sink: Arc<dyn DownstreamSink>,
        notifier: Arc<dyn FailureNotifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            source,
            sink,
            notifier,
            settings,
        }
    }

    fn queue(&self) -> DeliveryQueue<'_, DatabaseConnection> {
        DeliveryQueue::new(&self.db, self.settings.retry_policy)
    }

    pub async fn entry(&self, id: i32) -> Result<Option<delivery_entry::Model>> {
        Ok(self.queue().get(id).await?)
    }

    /// Cycle until `cancel` fires, or exactly once when `once` is set.
    pub async fn run(&self, cancel: CancellationToken, once: bool) {
        info!(
            once,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Starting pipeline"
        );

        loop {
            match self.run_cycle(&cancel).await {
                Ok(report) => info!(?report, "Cycle finished"),
                Err(e) => error!(error = %e, "Cycle aborted"),
            }

            if once {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!("Pipeline stopped");
    }

    /// Fetch and store new documents, then deliver what is due.
    ///
    /// Only an authentication failure or an unreachable store aborts the cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        self.ingest_phase(cancel, &mut report).await?;
        if cancel.is_cancelled() {
            return Ok(report);
        }
        self.delivery_phase(Utc::now(), cancel, &mut report).await?;
        Ok(report)
    }

    #[instrument(skip_all)]
    async fn ingest_phase(
        &self,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<()> {
        let until = Utc::now().date_naive();
        let since = until
            .checked_sub_days(Days::new(u64::from(self.settings.lookback_days)))
            .unwrap_or(until);

        let batch = match self.source.fetch_batch(since, until, cancel).await {
            Ok(batch) => batch,
            Err(e) => {
                let kind = e.kind();
                audit::record(&self.db, AuditLevel::Error, kind.as_str(), e.to_string(), None)
                    .await;
                return Err(e.into());
            }
        };
        report.fetched = batch.documents.len();
        report.fetch_failures = batch.failures.len();

        for failure in &batch.failures {
            let item = failure.item.as_deref().unwrap_or("*");
            audit::record(
                &self.db,
                AuditLevel::Warn,
                failure.kind().as_str(),
                format!("{} {item} skipped: {}", failure.doc_type, failure.error),
                None,
            )
            .await;
        }
        let docs = batch.documents;

        let store = DocumentStore::new(&self.db);
        let now = Utc::now();
        for doc in &docs {
            if cancel.is_cancelled() {
                break;
            }
            match store.insert_if_absent(doc, now).await {
                Ok(IngestOutcome::Inserted { document_id, .. }) => {
                    report.inserted += 1;
                    debug!(
                        document_id,
                        external_id = %doc.external_id,
                        doc_type = %doc.doc_type,
                        "Stored new document"
                    );
                }
                Ok(IngestOutcome::AlreadyExists { .. }) => report.duplicates += 1,
                Err(e) => {
                    report.ingest_errors += 1;
                    error!(external_id = %doc.external_id, error = %e, "Failed to store document");
                    audit::record(
                        &self.db,
                        AuditLevel::Error,
                        audit::STORE_FAILURE,
                        format!("{} {}: {e}", doc.doc_type, doc.external_id),
                        None,
                    )
                    .await;
                }
            }
        }

        if report.inserted > 0 {
            info!(fetched = report.fetched, inserted = report.inserted, "Ingested new documents");
            audit::record(
                &self.db,
                AuditLevel::Info,
                audit::INGESTED,
                format!("{} new of {} fetched", report.inserted, report.fetched),
                None,
            )
            .await;
        }
        Ok(())
    }

    async fn delivery_phase(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<()> {
        let entries = self.queue().select_due(now, self.settings.batch_size).await?;
        for entry in entries {
            if cancel.is_cancelled() {
                break;
            }
            let entry_id = entry.id;
            match self.deliver_entry(entry, now).await {
                Ok(DeliveryOutcome::Sent { .. }) => report.sent += 1,
                Ok(DeliveryOutcome::Failed(_)) => report.failed_attempts += 1,
                Ok(DeliveryOutcome::Skipped) => report.skipped += 1,
                Err(e) => error!(entry_id, error = %e, "Delivery attempt aborted"),
            }
        }
        Ok(())
    }

    /// Deliver every entry due at `now`, at most one batch.
    pub async fn deliver_due(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        self.delivery_phase(now, &CancellationToken::new(), &mut report)
            .await?;
        Ok(report)
    }

    /// Claim, render and send one entry, then record the outcome. An entry
    /// that cannot be claimed is left alone and reported as `Skipped`.
    #[instrument(skip_all, fields(entry_id = entry.id, document_id = entry.document_id))]
    pub async fn deliver_entry(
        &self,
        entry: delivery_entry::Model,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome> {
        let queue = self.queue();
        if !queue.claim(entry.id, now).await? {
            debug!("Entry no longer due, skipping");
            return Ok(DeliveryOutcome::Skipped);
        }

        let Some(doc) = DocumentStore::new(&self.db).get(entry.document_id).await? else {
            // Orphaned entry: park it instead of leaving it in flight.
            let attempt = FailedAttempt {
                kind: FailureKind::EncodingFailure,
                message: format!("Document {} not found", entry.document_id),
                http_status: None,
                response_body: None,
            };
            error!(error = %attempt.message, "Cannot deliver entry");
            return Ok(DeliveryOutcome::Failed(
                queue.record_failure(&entry, &attempt, now).await?,
            ));
        };

        let payload = match self.rendered_payload(&doc, now).await {
            Ok(payload) => payload,
            Err(e) => {
                let attempt = FailedAttempt {
                    kind: e.kind().unwrap_or(FailureKind::EncodingFailure),
                    message: e.to_string(),
                    http_status: None,
                    response_body: None,
                };
                return self.fail(&entry, &doc, attempt, now).await;
            }
        };

        let attempt = match self.sink.deliver(&payload, doc.doc_type).await {
            Ok(res) if res.is_success() => {
                queue.mark_sent(entry.id, res.status, &res.body, now).await?;
                info!(status = res.status, number = %doc.number, "Delivered");
                audit::record(
                    &self.db,
                    AuditLevel::Info,
                    audit::DELIVERED,
                    format!("{} {} delivered (HTTP {})", doc.doc_type, doc.number, res.status),
                    Some(doc.id),
                )
                .await;
                return Ok(DeliveryOutcome::Sent {
                    http_status: res.status,
                });
            }
            Ok(res) => FailedAttempt {
                kind: FailureKind::DeliveryRejected,
                message: format!("HTTP {}", res.status),
                http_status: Some(res.status),
                response_body: Some(res.body),
            },
            Err(e) => FailedAttempt {
                kind: FailureKind::DeliveryRejected,
                message: e.to_string(),
                http_status: None,
                response_body: None,
            },
        };
        self.fail(&entry, &doc, attempt, now).await
    }

    async fn fail(
        &self,
        entry: &delivery_entry::Model,
        doc: &edi_document::Model,
        attempt: FailedAttempt,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome> {
        let decision = self.queue().record_failure(entry, &attempt, now).await?;
        warn!(
            attempt = decision.attempts(),
            kind = %attempt.kind,
            status = %decision.status(),
            error = %attempt.message,
            "Delivery attempt failed"
        );
        audit::record(
            &self.db,
            AuditLevel::Error,
            attempt.kind.as_str(),
            format!(
                "{} {} attempt {}: {}",
                doc.doc_type,
                doc.number,
                decision.attempts(),
                attempt.message
            ),
            Some(doc.id),
        )
        .await;

        dispatch(
            self.notifier.clone(),
            Notification::Error {
                doc_type: doc.doc_type,
                number: doc.number.clone(),
                error: attempt.message.clone(),
            },
        );

        if decision.status().is_terminal() {
            let attempts = decision.attempts();
            audit::record(
                &self.db,
                AuditLevel::Error,
                FailureKind::TerminalDeliveryFailure.as_str(),
                format!("{} {} failed after {attempts} attempts", doc.doc_type, doc.number),
                Some(doc.id),
            )
            .await;
            dispatch(
                self.notifier.clone(),
                Notification::Failed {
                    doc_type: doc.doc_type,
                    number: doc.number.clone(),
                    attempts,
                },
            );
        }

        Ok(DeliveryOutcome::Failed(decision))
    }

    /// Cached payload of `doc`, rendering and caching it on first use.
    async fn rendered_payload(
        &self,
        doc: &edi_document::Model,
        now: DateTime<Utc>,
    ) -> Result<Rendered> {
        if let Some(cached) = cached_rendering(doc) {
            return Ok(cached);
        }
        self.render_and_cache(doc, now).await
    }

    async fn render_and_cache(
        &self,
        doc: &edi_document::Model,
        now: DateTime<Utc>,
    ) -> Result<Rendered> {
        let canonical = to_canonical(doc)?;
        let template = TemplateStore::new(&self.db).active_for(doc.doc_type).await?;
        let rendered = codec::render(&canonical, template.as_ref())?;
        DocumentStore::new(&self.db)
            .set_rendered(doc.id, &rendered, now)
            .await?;
        Ok(rendered)
    }

    /// Requeue one entry and deliver it right away. Refuses sent entries and
    /// entries with an attempt in flight.
    pub async fn retry_now(&self, entry_id: i32) -> Result<DeliveryOutcome> {
        let now = Utc::now();
        let entry = self.queue().requeue(entry_id, now).await?;
        info!(entry_id, attempts = entry.attempts, "Entry requeued by operator");
        audit::record(
            &self.db,
            AuditLevel::Info,
            audit::REQUEUED,
            format!("Entry {entry_id} requeued"),
            Some(entry.document_id),
        )
        .await;
        self.deliver_entry(entry, now).await
    }

    /// Fetch one document from upstream and store it if it is new.
    pub async fn force_ingest(&self, doc_type: DocType, external_id: &str) -> Result<IngestOutcome> {
        let doc = self
            .source
            .fetch_document(doc_type, external_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Upstream document {external_id}")))?;
        let outcome = DocumentStore::new(&self.db)
            .insert_if_absent(&doc, Utc::now())
            .await?;
        info!(external_id, doc_type = %doc_type, inserted = outcome.is_inserted(), "Forced ingest");
        Ok(outcome)
    }

    /// Render again with the current template and replace the cached payload.
    /// The delivery entry is not touched.
    pub async fn rerender(&self, document_id: i32) -> Result<Rendered> {
        let doc = DocumentStore::new(&self.db)
            .get(document_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Document {document_id}")))?;
        let rendered = self.render_and_cache(&doc, Utc::now()).await?;
        audit::record(
            &self.db,
            AuditLevel::Info,
            audit::RERENDERED,
            format!("{} {} re-rendered", doc.doc_type, doc.number),
            Some(doc.id),
        )
        .await;
        Ok(rendered)
    }

    /// Render the sample document through `template`, or through the default
    /// encoder when none is given.
    pub fn preview_template(
        &self,
        doc_type: DocType,
        template: Option<&WireTemplate>,
    ) -> Result<Rendered> {
        Ok(codec::preview(doc_type, template)?)
    }
}
