use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::config::UpstreamConfig;
use common::retry::retry_transient;
use common::{CanonicalDocument, DocType};
use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, UpstreamError};
use crate::json::{as_text, field, first_field};
use crate::normalize::{item_flow_id, item_id, normalize};
use crate::source::{FetchFailure, FetchReport, UpstreamSource};

const TOKEN_KEYS: &[&str] = &["token", "access_token", "accessToken"];
const LIST_KEYS: &[&str] = &["items", "documents"];
const TOTAL_KEYS: &[&str] = &["total", "totalCount"];

/// Longest upstream error body kept in an error message.
const ERROR_BODY_LIMIT: usize = 300;

/// Client for the exchange's REST v1 API.
///
/// The token is cached for the client's lifetime and refreshed once when any
/// endpoint answers 401.
pub struct DocrobotClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    token: Mutex<Option<String>>,
}

impl DocrobotClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn list_path(doc_type: DocType) -> String {
        format!(
            "/api/v1/documents/folders/inbox/docGroup/EDI/docTypes/{}",
            doc_type.as_str()
        )
    }

    fn document_path(doc_type: DocType, id: &str) -> String {
        format!("{}/document/{}", Self::list_path(doc_type), id)
    }

    fn transient_delay(&self) -> Duration {
        Duration::from_millis(self.config.transient_delay_ms)
    }

    async fn login(&self) -> Result<String> {
        if self.config.username.is_empty() {
            return Err(UpstreamError::Auth("no credentials configured".into()));
        }
        let url = self.url("/api/v1/auth");
        let url = url.as_str();
        let payload = json!({
            "login": self.config.username,
            "password": self.config.password,
        });
        let payload = &payload;

        let res = retry_transient(
            self.config.transient_attempts,
            self.transient_delay(),
            UpstreamError::is_transient,
            || async move {
                let res = self
                    .http
                    .post(url)
                    .timeout(Duration::from_secs(self.config.auth_timeout_secs))
                    .json(payload)
                    .send()
                    .await
                    .map_err(UpstreamError::from)?;
                reject_server_error(res).await
            },
        )
        .await?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Auth(format!(
                "credentials rejected with HTTP {}",
                status.as_u16()
            )));
        }
        let body = read_json(res, "auth").await?;
        let token = as_text(first_field(&body, TOKEN_KEYS));
        if token.is_empty() {
            return Err(UpstreamError::Auth("login response carries no token".into()));
        }
        info!("Authenticated with upstream exchange");
        Ok(token)
    }

    /// Cached token, logging in first if there is none.
    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn send_get(&self, url: &str, query: &[(&str, String)], token: &str) -> Result<Response> {
        let authorization = format!("{}{}", self.config.auth_header_prefix, token);
        let authorization = authorization.as_str();
        retry_transient(
            self.config.transient_attempts,
            self.transient_delay(),
            UpstreamError::is_transient,
            || async move {
                let res = self
                    .http
                    .get(url)
                    .header(reqwest::header::AUTHORIZATION, authorization)
                    .query(query)
                    .send()
                    .await
                    .map_err(UpstreamError::from)?;
                reject_server_error(res).await
            },
        )
        .await
    }

    /// Authorized GET returning a JSON body. A 401 invalidates the token and
    /// the request is repeated once with a fresh one.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        let token = self.token().await?;
        let mut res = self.send_get(&url, query, &token).await?;

        if res.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "Token rejected, re-authenticating");
            self.invalidate_token().await;
            let token = self.token().await?;
            res = self.send_get(&url, query, &token).await?;
            if res.status() == StatusCode::UNAUTHORIZED {
                self.invalidate_token().await;
                return Err(UpstreamError::Auth(format!(
                    "refreshed token rejected by {path}"
                )));
            }
        }

        read_json(res, path).await
    }

    /// Item references of one document type, across all pages.
    #[instrument(skip_all, fields(doc_type = %doc_type))]
    async fn list_refs(
        &self,
        doc_type: DocType,
        since: NaiveDate,
        until: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let path = Self::list_path(doc_type);
        let page_size = self.config.page_size.max(1);
        let mut refs = Vec::new();
        let mut page = self.config.first_page;

        for _ in 0..self.config.max_pages.max(1) {
            if cancel.is_cancelled() {
                break;
            }
            let query = [
                ("docDateFrom", since.format("%Y-%m-%d").to_string()),
                ("docDateTo", until.format("%Y-%m-%d").to_string()),
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
            ];
            let body = self.get_json(&path, &query).await?;
            let items = page_items(&body)
                .ok_or_else(|| UpstreamError::Malformed(format!("list page {page} has no items")))?;
            if items.is_empty() {
                break;
            }
            let count = items.len();
            refs.extend(items.iter().cloned());
            debug!(page, count, "Fetched list page");

            match page_total(&body) {
                Some(total) if refs.len() as u64 >= total => break,
                None if count < page_size as usize => break,
                _ => page += 1,
            }
        }
        Ok(refs)
    }

    /// Full envelope of one item, with the reference's identities filled in
    /// where the document endpoint omits them.
    async fn fetch_envelope(&self, doc_type: DocType, reference: &Value) -> Result<Value> {
        let id = item_id(reference)
            .ok_or_else(|| UpstreamError::Malformed("list item without documentId".into()))?;
        let mut envelope = self.get_json(&Self::document_path(doc_type, &id), &[]).await?;
        let missing_id = item_id(&envelope).is_none();
        let missing_flow_id = item_flow_id(&envelope).is_none();

        let Some(map) = envelope.as_object_mut() else {
            return Err(UpstreamError::Malformed(format!(
                "document {id} is not a JSON object"
            )));
        };
        if missing_id {
            map.insert("documentId".into(), Value::String(id));
        }
        if missing_flow_id {
            if let Some(flow_id) = item_flow_id(reference) {
                map.insert("docflowId".into(), Value::String(flow_id));
            }
        }
        for key in ["documentNumber", "documentDate", "sender", "receiver"] {
            if map.keys().any(|k| k.eq_ignore_ascii_case(key)) {
                continue;
            }
            if let Some(v) = field(reference, key) {
                map.insert(key.into(), v.clone());
            }
        }
        Ok(envelope)
    }

    /// Every document of one type in the window. Item-level failures are
    /// reported next to the documents unless they abort the cycle.
    #[instrument(skip_all, fields(doc_type = %doc_type))]
    async fn fetch_type(
        &self,
        doc_type: DocType,
        since: NaiveDate,
        until: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<FetchReport> {
        let refs = self.list_refs(doc_type, since, until, cancel).await?;
        let mut report = FetchReport::default();

        for reference in &refs {
            if cancel.is_cancelled() {
                debug!("Fetch cancelled");
                break;
            }
            let item = item_id(reference);
            let fetched = self
                .fetch_envelope(doc_type, reference)
                .await
                .and_then(|envelope| {
                    normalize(doc_type, &envelope).ok_or_else(|| {
                        UpstreamError::Malformed("item carries no identity".into())
                    })
                });
            match fetched {
                Ok(doc) => report.documents.push(doc),
                Err(e) if e.kind().aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(item = ?item, kind = %e.kind(), error = %e, "Skipping upstream item");
                    report.failures.push(FetchFailure {
                        doc_type,
                        item,
                        error: e,
                    });
                }
            }
        }

        info!(
            listed = refs.len(),
            normalized = report.documents.len(),
            skipped = report.failures.len(),
            "Fetched document type"
        );
        Ok(report)
    }
}

#[async_trait]
impl UpstreamSource for DocrobotClient {
    async fn authenticate(&self) -> Result<()> {
        self.invalidate_token().await;
        self.token().await.map(|_| ())
    }

    async fn fetch_batch(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<FetchReport> {
        self.token().await?;

        let mut report = FetchReport::default();
        for &doc_type in &self.config.doc_types {
            if cancel.is_cancelled() {
                break;
            }
            match self.fetch_type(doc_type, since, until, cancel).await {
                Ok(batch) => report.append(batch),
                Err(e) if e.kind().aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(doc_type = %doc_type, kind = %e.kind(), error = %e, "Skipping document type for this cycle");
                    report.failures.push(FetchFailure {
                        doc_type,
                        item: None,
                        error: e,
                    });
                }
            }
        }
        Ok(report)
    }

    async fn fetch_document(
        &self,
        doc_type: DocType,
        external_id: &str,
    ) -> Result<Option<CanonicalDocument>> {
        let reference = json!({ "documentId": external_id });
        let envelope = self.fetch_envelope(doc_type, &reference).await?;
        Ok(normalize(doc_type, &envelope))
    }
}

/// Turn a 5xx answer into an error so the request is retried.
async fn reject_server_error(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_server_error() {
        let body = res.text().await.unwrap_or_default();
        return Err(UpstreamError::Http {
            status: status.as_u16(),
            body: truncate(&body, ERROR_BODY_LIMIT),
        });
    }
    Ok(res)
}

async fn read_json(res: Response, what: &str) -> Result<Value> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(UpstreamError::Http {
            status: status.as_u16(),
            body: truncate(&body, ERROR_BODY_LIMIT),
        });
    }
    let text = res.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| UpstreamError::Malformed(format!("invalid JSON from {what}: {e}")))
}

fn page_items(body: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = body {
        return Some(items);
    }
    LIST_KEYS
        .iter()
        .find_map(|key| field(body, key).and_then(Value::as_array))
}

fn page_total(body: &Value) -> Option<u64> {
    match first_field(body, TOTAL_KEYS)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}
