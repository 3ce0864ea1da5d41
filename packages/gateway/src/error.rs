use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codec::CodecError;
use common::FailureKind;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Transport-level failure talking to the downstream receiver.
    #[error("Delivery transport error: {0}")]
    Sink(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Delivery entry {0} has already been sent")]
    AlreadySent(i32),

    #[error("Delivery entry {0} has an attempt in flight")]
    InFlight(i32),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Failure class for audit records, where one applies.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Upstream(e) => Some(e.kind()),
            Self::Codec(_) => Some(FailureKind::EncodingFailure),
            Self::Sink(_) => Some(FailureKind::DeliveryRejected),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Structured error body of the operator API.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// One of: `VALIDATION_ERROR`, `NOT_FOUND`, `CONFLICT`, `UPSTREAM_ERROR`,
    /// `ENCODING_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "CONFLICT")]
    pub code: &'static str,
    #[schema(example = "Delivery entry 7 has already been sent")]
    pub message: String,
}

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    Encoding(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message,
                },
            ),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message,
                },
            ),
            AppError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message,
                },
            ),
            AppError::Upstream(message) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    code: "UPSTREAM_ERROR",
                    message,
                },
            ),
            AppError::Encoding(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "ENCODING_ERROR",
                    message,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            GatewayError::AlreadySent(id) => {
                AppError::Conflict(format!("Delivery entry {id} has already been sent"))
            }
            GatewayError::InFlight(id) => {
                AppError::Conflict(format!("Delivery entry {id} is being delivered"))
            }
            GatewayError::Upstream(e) => AppError::Upstream(e.to_string()),
            GatewayError::Codec(e) => AppError::Encoding(e.to_string()),
            GatewayError::Config(msg) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}
