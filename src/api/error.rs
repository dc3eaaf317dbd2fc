//! HTTP error mapping.

use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{IcuError, PredictionError};
use crate::storage::StorageError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400: malformed path parameter.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 404: unknown patient.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 422: patient exists but lacks model inputs.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// 503: store temporarily unreachable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// 500: anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<IcuError> for ApiError {
    fn from(err: IcuError) -> Self {
        match err {
            IcuError::Prediction(PredictionError::UnknownPatient { .. })
            | IcuError::Storage(StorageError::PatientNotFound(_)) => Self::NotFound(err.to_string()),
            IcuError::Prediction(PredictionError::MissingSignal { .. }) => {
                Self::Unprocessable(err.to_string())
            }
            IcuError::Storage(ref e) if e.is_transient() => Self::Unavailable(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::Unavailable(msg) => {
                tracing::warn!("Store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".into())
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
