//! Error-to-response adapter.
//!
//! Every failure leaving the service is rendered as a UTF-8 plain-text body
//! carrying only the error message.

use http::StatusCode;
use restsign_auth::AuthError;

use crate::body::RestResponseBody;

/// Content type of every error and rejection response.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=UTF-8";

/// An error carrying the status and message of the response it becomes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct RestError {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub message: String,
}

impl RestError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// No handler exists for the request path.
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, format!("no handler for {path}"))
    }

    /// An unexpected failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Render the error as a plain-text response.
    #[must_use]
    pub fn into_response(self) -> http::Response<RestResponseBody> {
        text_response(self.status, self.message)
    }
}

impl From<AuthError> for RestError {
    fn from(err: AuthError) -> Self {
        Self::with_status(err.status_code(), err.to_string())
    }
}

/// Build a `text/plain; charset=UTF-8` response.
#[must_use]
pub fn text_response(
    status: StatusCode,
    message: impl Into<String>,
) -> http::Response<RestResponseBody> {
    let mut response = http::Response::new(RestResponseBody::from_string(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(TEXT_PLAIN_UTF8),
    );
    response
}
