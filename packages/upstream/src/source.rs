use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CanonicalDocument, DocType, FailureKind};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, UpstreamError};

/// An item, or a whole document type, left out of a batch.
#[derive(Debug)]
pub struct FetchFailure {
    pub doc_type: DocType,
    /// Upstream id of the item, when the failure is about a single item.
    pub item: Option<String>,
    pub error: UpstreamError,
}

impl FetchFailure {
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Outcome of one [`UpstreamSource::fetch_batch`].
#[derive(Debug, Default)]
pub struct FetchReport {
    pub documents: Vec<CanonicalDocument>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn append(&mut self, other: FetchReport) {
        self.documents.extend(other.documents);
        self.failures.extend(other.failures);
    }
}

/// One upstream API generation.
///
/// The orchestrator only sees this trait, so a newer generation of the
/// exchange API can replace [`crate::DocrobotClient`] without touching
/// the normalizer output or anything downstream of it.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Exchange credentials for a token and cache it.
    async fn authenticate(&self) -> Result<()>;

    /// All documents of the configured types dated within `[since, until]`.
    ///
    /// Items and document types that cannot be fetched are reported in
    /// [`FetchReport::failures`]. Only an authentication failure is returned
    /// as an error; it means nothing further can be fetched this cycle.
    /// Once `cancel` fires, the documents gathered so far are returned.
    async fn fetch_batch(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<FetchReport>;

    /// A single document by its external id. `Ok(None)` when the item exists
    /// but carries no identity.
    async fn fetch_document(
        &self,
        doc_type: DocType,
        external_id: &str,
    ) -> Result<Option<CanonicalDocument>>;
}
