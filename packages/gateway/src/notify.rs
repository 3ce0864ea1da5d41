use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::DocType;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Upper bound on one notification.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Receiver of delivery failures (chat bot, mail, pager...).
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    /// Any failed delivery attempt.
    async fn delivery_error(&self, doc_type: DocType, number: &str, error: &str);

    /// An entry ran out of attempts and now needs an operator.
    async fn delivery_failed(&self, doc_type: DocType, number: &str, attempts: u32);
}

/// Notifier that only writes to the log.
pub struct TracingNotifier;

#[async_trait]
impl FailureNotifier for TracingNotifier {
    async fn delivery_error(&self, doc_type: DocType, number: &str, error: &str) {
        warn!(doc_type = %doc_type, number, error, "Delivery attempt failed");
    }

    async fn delivery_failed(&self, doc_type: DocType, number: &str, attempts: u32) {
        error!(doc_type = %doc_type, number, attempts, "Delivery failed permanently");
    }
}

#[derive(Debug, Clone)]
pub enum Notification {
    Error {
        doc_type: DocType,
        number: String,
        error: String,
    },
    Failed {
        doc_type: DocType,
        number: String,
        attempts: u32,
    },
}

/// Fire-and-forget: runs on its own task under [`NOTIFY_TIMEOUT`].
pub fn dispatch(notifier: Arc<dyn FailureNotifier>, notification: Notification) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = async {
            match &notification {
                Notification::Error {
                    doc_type,
                    number,
                    error,
                } => notifier.delivery_error(*doc_type, number, error).await,
                Notification::Failed {
                    doc_type,
                    number,
                    attempts,
                } => notifier.delivery_failed(*doc_type, number, *attempts).await,
            }
        };
        if tokio::time::timeout(NOTIFY_TIMEOUT, send).await.is_err() {
            warn!(?notification, "Failure notification timed out");
        }
    })
}
