use serde::Deserialize;

use crate::DocType;

/// Upstream exchange connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Exchange API root. Default: "https://edi-api.docrobot.kz".
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Document types polled each cycle. Default: all.
    #[serde(default = "default_doc_types")]
    pub doc_types: Vec<DocType>,
    /// List page size. Default: 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Number of the first list page (the exchange counts from 1). Default: 1.
    #[serde(default = "default_first_page")]
    pub first_page: u32,
    /// Hard stop for pagination per document type. Default: 1000.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Size of the trailing date window queried each cycle. Default: 7.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Attempts per request on network-level failures. Default: 3.
    #[serde(default = "default_transient_attempts")]
    pub transient_attempts: u32,
    /// Pause between those attempts. Default: 3000.
    #[serde(default = "default_transient_delay_ms")]
    pub transient_delay_ms: u64,
    /// Prefix put before the token in `Authorization`. Empty sends the raw token.
    #[serde(default)]
    pub auth_header_prefix: String,
}

/// Smallest and largest accepted trailing window, in days.
pub const LOOKBACK_DAYS_RANGE: (u32, u32) = (1, 30);

impl UpstreamConfig {
    /// Trailing window clamped to the supported range.
    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
            .clamp(LOOKBACK_DAYS_RANGE.0, LOOKBACK_DAYS_RANGE.1)
    }
}

fn default_upstream_url() -> String {
    "https://edi-api.docrobot.kz".into()
}
fn default_doc_types() -> Vec<DocType> {
    DocType::ALL.to_vec()
}
fn default_page_size() -> u32 {
    100
}
fn default_first_page() -> u32 {
    1
}
fn default_max_pages() -> u32 {
    1000
}
fn default_lookback_days() -> u32 {
    7
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_auth_timeout_secs() -> u64 {
    15
}
fn default_transient_attempts() -> u32 {
    3
}
fn default_transient_delay_ms() -> u64 {
    3000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            username: String::new(),
            password: String::new(),
            doc_types: default_doc_types(),
            page_size: default_page_size(),
            first_page: default_first_page(),
            max_pages: default_max_pages(),
            lookback_days: default_lookback_days(),
            request_timeout_secs: default_request_timeout_secs(),
            auth_timeout_secs: default_auth_timeout_secs(),
            transient_attempts: default_transient_attempts(),
            transient_delay_ms: default_transient_delay_ms(),
            auth_header_prefix: String::new(),
        }
    }
}

/// Downstream receiver settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DownstreamConfig {
    /// Receiver endpoint. Default: "http://localhost/hs/docrobot/orders".
    #[serde(default = "default_downstream_url")]
    pub url: String,
    /// Basic-auth user. Anonymous when unset or empty.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_downstream_timeout_secs")]
    pub timeout_secs: u64,
    /// Header carrying the document type code. Default: "X-Document-Type".
    #[serde(default = "default_doc_type_header")]
    pub doc_type_header: String,
}

fn default_downstream_url() -> String {
    "http://localhost/hs/docrobot/orders".into()
}
fn default_downstream_timeout_secs() -> u64 {
    30
}
fn default_doc_type_header() -> String {
    "X-Document-Type".into()
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            url: default_downstream_url(),
            username: None,
            password: None,
            timeout_secs: default_downstream_timeout_secs(),
            doc_type_header: default_doc_type_header(),
        }
    }
}

/// Delivery queue settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Failures before an entry becomes `Failed`. Default: 5.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Entries processed per cycle. Default: 20.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_backoff_cap_minutes")]
    pub backoff_cap_minutes: u32,
}

fn default_max_retries() -> u32 {
    5
}
fn default_batch_size() -> u64 {
    20
}
fn default_backoff_cap_minutes() -> u32 {
    crate::retry::DEFAULT_BACKOFF_CAP_MINUTES
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> crate::RetryPolicy {
        crate::RetryPolicy::new(self.max_retries, self.backoff_cap_minutes)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            backoff_cap_minutes: default_backoff_cap_minutes(),
        }
    }
}
