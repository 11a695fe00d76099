//! Error types for request signature verification.
//!
//! [`AuthError`] covers both the expected, client-facing rejections (missing or
//! invalid signature) and the faults that abort a single request. Rejections
//! map to a fixed status and a plain-text message; faults map to a 500.

use http::StatusCode;

/// Errors that can occur while auditing and verifying a signed request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `hisv` header is missing or empty on an endpoint that enforces signing.
    #[error("signature missed")]
    MissingSignature,

    /// The presented signature does not match the recomputed one.
    #[error("invalid signature")]
    InvalidSignature,

    /// The request body or an uploaded file could not be read.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The file digest backend is not available.
    #[error("file digest unavailable: {0}")]
    Digest(String),

    /// Any other failure; the request is rejected.
    #[error("unhandled fault: {0}")]
    Unhandled(String),
}

impl AuthError {
    /// Status code used on the wire for this error.
    ///
    /// Signature rejections share the fixed 416 status; every fault is a 500.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::BodyRead(_) | Self::Digest(_) | Self::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether this error is an expected signature rejection rather than a fault.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::MissingSignature | Self::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_fixed_messages_for_rejections() {
        assert_eq!(AuthError::MissingSignature.to_string(), "signature missed");
        assert_eq!(AuthError::InvalidSignature.to_string(), "invalid signature");
    }

    #[test]
    fn test_should_map_rejections_to_416() {
        assert_eq!(AuthError::MissingSignature.status_code().as_u16(), 416);
        assert_eq!(AuthError::InvalidSignature.status_code().as_u16(), 416);
        assert!(AuthError::InvalidSignature.is_rejection());
    }

    #[test]
    fn test_should_map_faults_to_500() {
        let err = AuthError::BodyRead("connection reset".to_owned());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_rejection());
        assert_eq!(
            AuthError::Digest("sha3".to_owned()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
