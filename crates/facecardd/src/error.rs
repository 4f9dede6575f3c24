use crate::engine::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use facecard_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Every way a handler can fail, mapped to a status and a
/// `{success: false, error}` body (`message` instead of `error` for
/// [`ApiError::NoFace`]).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("No face detected in the image")]
    NoFace,
    #[error("User not found")]
    UserNotFound,
    #[error("No {0} card for this user")]
    CardNotFound(String),
    #[error("This card number is already registered")]
    DuplicateCard,
    #[error("Reward not found or inactive")]
    RewardNotFound,
    #[error("Reward already claimed")]
    AlreadyClaimed,
    #[error("Not eligible for this reward")]
    NotEligible,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::MissingFields(_)
            | ApiError::NoFace
            | ApiError::DuplicateCard
            | ApiError::AlreadyClaimed => StatusCode::BAD_REQUEST,
            ApiError::UserNotFound | ApiError::CardNotFound(_) | ApiError::RewardNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::NotEligible => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(_) => ApiError::UserNotFound,
            StoreError::CardNotFound { business, .. } => ApiError::CardNotFound(business),
            StoreError::DuplicateCard(_) => ApiError::DuplicateCard,
            StoreError::RewardNotFound(_) => ApiError::RewardNotFound,
            StoreError::AlreadyClaimed(_) => ApiError::AlreadyClaimed,
            StoreError::NotEligible { .. } => ApiError::NotEligible,
            StoreError::Invalid { field, reason } => ApiError::BadRequest(format!("{field} {reason}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(store) => store.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        let key = match &self {
            ApiError::NoFace => "message",
            _ => "error",
        };
        (status, Json(json!({ "success": false, key: self.to_string() }))).into_response()
    }
}
