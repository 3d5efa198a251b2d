use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use service::referral::ReferralError;

/// JSON error body: `{"error", "code", "detail"}` plus optional extras.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub title: &'static str,
    pub code: Option<u16>,
    pub detail: Option<String>,
    pub extra: Option<(&'static str, serde_json::Value)>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, title: &'static str, detail: Option<String>) -> Self {
        Self { status, title, code: None, detail, extra: None }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", Some(detail.into()))
    }
}

impl From<ReferralError> for JsonApiError {
    fn from(e: ReferralError) -> Self {
        let (status, title) = match &e {
            ReferralError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Validation Error"),
            ReferralError::InvalidState(_) => (StatusCode::BAD_REQUEST, "Invalid State"),
            ReferralError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ReferralError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ReferralError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ReferralError::PartialDistributionFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Partial Distribution Failure"),
            ReferralError::CorruptGraph { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "Corrupt Referral Graph"),
            ReferralError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };
        let extra = match &e {
            ReferralError::PartialDistributionFailure(report) => {
                Some(("report", serde_json::to_value(report).unwrap_or_default()))
            }
            _ => None,
        };
        Self { status, title, code: Some(e.code()), detail: Some(e.to_string()), extra }
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, code = ?self.code, detail = ?self.detail, "request failed");
        }
        let mut body = json!({"error": self.title, "code": self.code, "detail": self.detail});
        if let (Some((key, value)), Some(obj)) = (self.extra, body.as_object_mut()) {
            obj.insert(key.to_string(), value);
        }
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database unavailable: {0}")]
    Database(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
