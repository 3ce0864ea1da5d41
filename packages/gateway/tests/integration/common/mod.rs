use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use axum::routing::post;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::config::DownstreamConfig;
use common::{CanonicalDocument, DocType, LineItem, RetryPolicy};
use reqwest::Client;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use tokio_util::sync::CancellationToken;
use upstream::{FetchFailure, FetchReport, UpstreamError, UpstreamSource};

use gateway::config::DatabaseConfig;
use gateway::entity::{activity_log, delivery_entry, edi_document};
use gateway::notify::FailureNotifier;
use gateway::pipeline::{Pipeline, PipelineSettings};
use gateway::sink::HttpSink;
use gateway::state::AppState;

pub mod routes {
    pub const HEALTH: &str = "/api/v1/health";
    pub const OPENAPI: &str = "/api-docs/openapi.json";
    pub const INGEST: &str = "/api/v1/documents/ingest";
    pub const TEMPLATES: &str = "/api/v1/templates";
    pub const TEMPLATE_PREVIEW: &str = "/api/v1/templates/preview";

    pub fn template(doc_type: &str) -> String {
        format!("/api/v1/templates/{doc_type}")
    }

    pub fn entry_retry(id: i32) -> String {
        format!("/api/v1/entries/{id}/retry")
    }

    pub fn document_render(id: i32) -> String {
        format!("/api/v1/documents/{id}/render")
    }
}

/// Fresh in-memory database with the schema synced.
///
/// One connection only: every pooled connection would open its own empty
/// `:memory:` database.
pub async fn test_db() -> DatabaseConnection {
    gateway::database::init_db(&DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
    })
    .await
    .expect("Failed to initialize test database")
}

/// Fixed clock origin for delivery tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn order(external_id: &str, number: &str) -> CanonicalDocument {
    let mut doc = CanonicalDocument::new(external_id, DocType::Order);
    doc.number = number.into();
    doc.date = NaiveDate::from_ymd_opt(2026, 3, 1);
    doc.supplier_id = "4600000000001".into();
    doc.buyer_id = "4600000000002".into();
    let mut line = LineItem::new(1);
    line.product_code = "4870000000011".into();
    line.product_name = "Milk 1L".into();
    line.quantity = 12.0;
    doc.lines.push(line);
    doc
}

/// Upstream double serving a fixed set of documents.
#[derive(Default)]
pub struct StaticSource {
    pub docs: Vec<CanonicalDocument>,
    /// Item ids reported as malformed on every fetch.
    pub malformed: Vec<String>,
    pub reject_auth: bool,
}

#[async_trait]
impl UpstreamSource for StaticSource {
    async fn authenticate(&self) -> upstream::error::Result<()> {
        if self.reject_auth {
            return Err(UpstreamError::Auth("credentials rejected".into()));
        }
        Ok(())
    }

    async fn fetch_batch(
        &self,
        _since: NaiveDate,
        _until: NaiveDate,
        cancel: &CancellationToken,
    ) -> upstream::error::Result<FetchReport> {
        self.authenticate().await?;
        if cancel.is_cancelled() {
            return Ok(FetchReport::default());
        }
        let failures = self
            .malformed
            .iter()
            .map(|id| FetchFailure {
                doc_type: DocType::Order,
                item: Some(id.clone()),
                error: UpstreamError::Malformed("item carries no identity".into()),
            })
            .collect();
        Ok(FetchReport {
            documents: self.docs.clone(),
            failures,
        })
    }

    async fn fetch_document(
        &self,
        doc_type: DocType,
        external_id: &str,
    ) -> upstream::error::Result<Option<CanonicalDocument>> {
        self.authenticate().await?;
        self.docs
            .iter()
            .find(|d| d.doc_type == doc_type && d.external_id == external_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| UpstreamError::Http {
                status: 404,
                body: "not found".into(),
            })
    }
}

/// One request seen by the [`Receiver`].
#[derive(Debug, Clone)]
pub struct Received {
    pub body: String,
    pub content_type: Option<String>,
    pub doc_type: Option<String>,
}

/// Downstream receiver answering with scripted statuses, then 200.
#[derive(Default)]
pub struct Receiver {
    pub script: Mutex<VecDeque<u16>>,
    pub received: Mutex<Vec<Received>>,
}

impl Receiver {
    pub fn respond_with(&self, statuses: &[u16]) {
        self.script.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn receive(State(rx): State<Arc<Receiver>>, headers: HeaderMap, body: String) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    rx.received.lock().unwrap().push(Received {
        body,
        content_type: header("content-type"),
        doc_type: header("x-document-type"),
    });
    let status = rx.script.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

pub async fn spawn_receiver() -> (SocketAddr, Arc<Receiver>) {
    let rx = Arc::new(Receiver::default());
    let app = Router::new()
        .route("/inbox", post(receive))
        .with_state(rx.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind receiver");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Receiver crashed");
    });
    (addr, rx)
}

/// Notifier that remembers every call.
#[derive(Default)]
pub struct RecordingNotifier {
    pub errors: Mutex<Vec<(DocType, String, String)>>,
    pub failures: Mutex<Vec<(DocType, String, u32)>>,
}

impl RecordingNotifier {
    /// Wait for the spawned notification tasks to land.
    pub async fn wait_for(&self, errors: usize, failures: usize) {
        for _ in 0..100 {
            if self.errors.lock().unwrap().len() >= errors
                && self.failures.lock().unwrap().len() >= failures
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "Expected {errors} error and {failures} failure notifications, got {} and {}",
            self.errors.lock().unwrap().len(),
            self.failures.lock().unwrap().len()
        );
    }
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn delivery_error(&self, doc_type: DocType, number: &str, error: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((doc_type, number.to_string(), error.to_string()));
    }

    async fn delivery_failed(&self, doc_type: DocType, number: &str, attempts: u32) {
        self.failures
            .lock()
            .unwrap()
            .push((doc_type, number.to_string(), attempts));
    }
}

/// A pipeline wired to an in-memory database, a [`StaticSource`], a live
/// [`Receiver`] behind the real HTTP sink, and a [`RecordingNotifier`].
pub struct TestApp {
    pub db: DatabaseConnection,
    pub pipeline: Arc<Pipeline>,
    pub receiver: Arc<Receiver>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn spawn(docs: Vec<CanonicalDocument>) -> Self {
        let source = StaticSource {
            docs,
            ..Default::default()
        };
        Self::with_source(source, RetryPolicy::default()).await
    }

    pub async fn with_source(source: StaticSource, policy: RetryPolicy) -> Self {
        Self::with_upstream(Arc::new(source), policy).await
    }

    pub async fn with_upstream(source: Arc<dyn UpstreamSource>, policy: RetryPolicy) -> Self {
        let db = test_db().await;
        let (addr, receiver) = spawn_receiver().await;
        let sink = HttpSink::new(DownstreamConfig {
            url: format!("http://{addr}/inbox"),
            timeout_secs: 5,
            ..Default::default()
        })
        .expect("Failed to build sink");
        let notifier = Arc::new(RecordingNotifier::default());

        let settings = PipelineSettings {
            retry_policy: policy,
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let pipeline = Arc::new(Pipeline::new(
            db.clone(),
            source,
            Arc::new(sink),
            notifier.clone(),
            settings,
        ));

        Self {
            db,
            pipeline,
            receiver,
            notifier,
        }
    }

    /// Serve the operator API on an ephemeral port.
    pub async fn serve_ops(&self) -> OpsClient {
        let app = gateway::build_router(AppState {
            pipeline: self.pipeline.clone(),
            db: self.db.clone(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind operator API");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Operator API crashed");
        });
        OpsClient {
            addr,
            client: Client::new(),
        }
    }

    pub async fn entries(&self) -> Vec<delivery_entry::Model> {
        delivery_entry::Entity::find()
            .all(&self.db)
            .await
            .expect("Failed to load entries")
    }

    pub async fn entry(&self, id: i32) -> delivery_entry::Model {
        delivery_entry::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .expect("Failed to load entry")
            .expect("Entry missing")
    }

    pub async fn document(&self, id: i32) -> edi_document::Model {
        edi_document::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .expect("Failed to load document")
            .expect("Document missing")
    }

    pub async fn document_count(&self) -> u64 {
        edi_document::Entity::find()
            .count(&self.db)
            .await
            .expect("Failed to count documents")
    }

    pub async fn audit_actions(&self) -> Vec<String> {
        activity_log::Entity::find()
            .all(&self.db)
            .await
            .expect("Failed to load audit log")
            .into_iter()
            .map(|m| m.action)
            .collect()
    }
}

pub struct OpsClient {
    pub addr: SocketAddr,
    pub client: Client,
}

impl OpsClient {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_empty(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// POST a raw body with the given content type, if any.
    pub async fn post_raw(
        &self,
        path: &str,
        body: &'static str,
        content_type: Option<&str>,
    ) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).body(body);
        if let Some(content_type) = content_type {
            req = req.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        req.send().await.expect("Request failed")
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }
}
