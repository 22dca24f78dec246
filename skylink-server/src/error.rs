//! Mapping of proxy failures onto HTTP responses.
//!
//! Every failure body is `{ "error": "<message>" }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use skylink_core::{ProxyError, UpstreamError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// The AI provider chain failed after any fallback.
    #[error("Failed to generate AI analysis. Details: {}", .0.message)]
    Analysis(UpstreamError),

    /// The request body could not be read, e.g. it exceeds the size limit.
    #[error("{1}")]
    Rejected(StatusCode, String),
}

impl ApiError {
    /// Upstream AI failures are always reported as 500 with the detail embedded.
    pub fn analysis(err: ProxyError) -> Self {
        match err {
            ProxyError::Upstream(e) => ApiError::Analysis(e),
            other => ApiError::Proxy(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Proxy(ProxyError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Proxy(ProxyError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Proxy(ProxyError::Upstream(e)) => relayed_status(e),
            ApiError::Analysis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected(status, _) => *status,
        }
    }
}

/// Relay the upstream status when it is an error status, else 500.
fn relayed_status(err: &UpstreamError) -> StatusCode {
    err.status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Proxy(ProxyError::Validation(_)) | ApiError::Rejected(..) => {}
            ApiError::Proxy(ProxyError::Configuration(m)) => {
                error!(message = %m, "configuration error");
            }
            ApiError::Proxy(ProxyError::Upstream(e)) | ApiError::Analysis(e) => {
                error!(status = ?e.status, code = ?e.code, message = %e.message, "upstream error");
            }
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
