use common::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Credentials rejected, token missing, or a refreshed token rejected again.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network-level failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response or item that cannot be interpreted.
    #[error("Malformed upstream data: {0}")]
    Malformed(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl UpstreamError {
    /// Whether the request that produced this error is worth repeating as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(e) => !e.is_decode() && !e.is_builder(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Auth(_) => FailureKind::AuthFailure,
            Self::Transient(_) => FailureKind::TransientNetworkFailure,
            Self::Http { status, .. } if *status >= 500 => FailureKind::TransientNetworkFailure,
            Self::Http { .. } | Self::Malformed(_) | Self::Config(_) => {
                FailureKind::MalformedUpstreamItem
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
