use common::DocType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Template for {0} has an empty body")]
    EmptyTemplate(DocType),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
