use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sift_core::SiftError;
use std::time::Duration;
use tracing::warn;

/// A [`SiftError`] on its way out of an HTTP handler.
///
/// Backend failures are reported with a generic message; their detail goes to
/// the log only.
#[derive(Debug)]
pub struct ApiError(pub SiftError);

impl From<SiftError> for ApiError {
    fn from(err: SiftError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SiftError::InvalidInput(_) | SiftError::Json(_) => StatusCode::BAD_REQUEST,
            SiftError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SiftError::StoreUnavailable(_)
            | SiftError::DelegateUnavailable(_)
            | SiftError::EmbeddingFailure(_)
            | SiftError::Corpus(_)
            | SiftError::Fetch(_) => StatusCode::SERVICE_UNAVAILABLE,
            SiftError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SiftError::Config(_) | SiftError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match &self.0 {
            SiftError::InvalidInput(msg) => msg.clone(),
            SiftError::Json(e) => format!("malformed request body: {e}"),
            SiftError::RateLimited { .. } => "rate limit exceeded".to_string(),
            SiftError::Timeout(_) => "request timed out".to_string(),
            SiftError::StoreUnavailable(_)
            | SiftError::DelegateUnavailable(_)
            | SiftError::EmbeddingFailure(_)
            | SiftError::Corpus(_)
            | SiftError::Fetch(_) => "search backend temporarily unavailable".to_string(),
            SiftError::Config(_) | SiftError::Io(_) => "internal error".to_string(),
        }
    }
}

/// Whole seconds for a `retry-after` header, rounded up and at least 1.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "Search request failed");
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        let mut response = (status, body).into_response();

        if let SiftError::RateLimited { retry_after } = self.0 {
            let secs = retry_after_secs(retry_after);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
