use serde::{Deserialize, Serialize};

/// Failure classes of the relay, used as machine-readable tags in audit
/// records and in the `last_error` of delivery entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Credentials rejected or token refresh exhausted. Aborts the fetch phase.
    AuthFailure,
    /// Network-level failure that survived local retries.
    TransientNetworkFailure,
    /// Upstream item could not be turned into a document. Skipped.
    MalformedUpstreamItem,
    /// Template or default encoder could not produce a payload.
    EncodingFailure,
    /// Downstream answered with a non-2xx status, or the transport failed.
    DeliveryRejected,
    /// Attempts exhausted. Needs manual action.
    TerminalDeliveryFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthFailure => "AUTH_FAILURE",
            Self::TransientNetworkFailure => "TRANSIENT_NETWORK_FAILURE",
            Self::MalformedUpstreamItem => "MALFORMED_UPSTREAM_ITEM",
            Self::EncodingFailure => "ENCODING_FAILURE",
            Self::DeliveryRejected => "DELIVERY_REJECTED",
            Self::TerminalDeliveryFailure => "TERMINAL_DELIVERY_FAILURE",
        }
    }

    /// Whether this failure stops the whole fetch phase of a cycle.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, Self::AuthFailure)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
