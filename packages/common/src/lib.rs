pub mod config;
pub mod dates;
pub mod delivery_status;
pub mod doc_type;
pub mod document;
pub mod failure;
pub mod retry;

pub use delivery_status::DeliveryStatus;
pub use doc_type::DocType;
pub use document::{CanonicalDocument, LineItem};
pub use failure::FailureKind;
pub use retry::{RetryDecision, RetryPolicy};
