use std::time::Duration;

use async_trait::async_trait;
use codec::Rendered;
use common::DocType;
use common::config::DownstreamConfig;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Downstream answer to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResponse {
    pub status: u16,
    pub body: String,
}

impl SinkResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers one encoded payload. Implementations never retry; a transport
/// failure comes back as [`GatewayError::Sink`].
#[async_trait]
pub trait DownstreamSink: Send + Sync {
    async fn deliver(&self, payload: &Rendered, doc_type: DocType) -> Result<SinkResponse>;
}

pub struct HttpSink {
    http: reqwest::Client,
    config: DownstreamConfig,
}

impl HttpSink {
    pub fn new(config: DownstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("downstream client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl DownstreamSink for HttpSink {
    async fn deliver(&self, payload: &Rendered, doc_type: DocType) -> Result<SinkResponse> {
        let mut req = self
            .http
            .post(&self.config.url)
            .header(CONTENT_TYPE, &payload.content_type)
            .header(self.config.doc_type_header.as_str(), doc_type.as_str())
            .body(payload.body.clone());

        if let Some(user) = self.config.username.as_deref().filter(|u| !u.is_empty()) {
            req = req.basic_auth(user, self.config.password.as_deref());
        }

        let res = req
            .send()
            .await
            .map_err(|e| GatewayError::Sink(e.to_string()))?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .map_err(|e| GatewayError::Sink(e.to_string()))?;

        debug!(doc_type = %doc_type, status, "Downstream responded");
        Ok(SinkResponse { status, body })
    }
}
