//! Upstream side of the gateway: the exchange client and the normalizer that
//! turns its heterogeneous payloads into [`common::CanonicalDocument`]s.

pub mod client;
pub mod error;
pub mod json;
pub mod normalize;
pub mod source;

pub use client::DocrobotClient;
pub use error::UpstreamError;
pub use normalize::normalize;
pub use source::{FetchFailure, FetchReport, UpstreamSource};
