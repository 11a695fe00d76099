//! Dispatch of verified requests to the application handler.
//!
//! The service calls [`dispatch_request`] only after the auditor has allowed
//! the request. A panicking handler is turned into a 500 response so the
//! request still fails closed and the completion hook still runs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use restsign_auth::{AuthError, IncomingRequest};

use crate::body::RestResponseBody;
use crate::error::RestError;

/// Boxed future returned by [`RestHandler::handle`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<RestResponseBody>, RestError>> + Send>>;

/// Trait that the application must implement.
///
/// This is the boundary between the signature layer and the business logic.
/// The handler receives the raw request parts together with the decoded
/// request snapshot the signature was checked against.
pub trait RestHandler: Send + Sync + 'static {
    /// Handle a verified request and produce an HTTP response.
    fn handle(&self, parts: http::request::Parts, request: IncomingRequest) -> HandlerFuture;
}

/// Dispatch a verified request to the handler.
pub async fn dispatch_request<H: RestHandler>(
    handler: &H,
    parts: http::request::Parts,
    request: IncomingRequest,
) -> Result<http::Response<RestResponseBody>, RestError> {
    tracing::debug!(method = %parts.method, path = parts.uri.path(), "dispatching request");
    match AssertUnwindSafe(handler.handle(parts, request))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(_) => Err(AuthError::Unhandled("request handler panicked".to_owned()).into()),
    }
}

/// A handler that answers every request with 404.
#[derive(Debug, Clone, Default)]
pub struct NotFoundHandler;

impl RestHandler for NotFoundHandler {
    fn handle(&self, parts: http::request::Parts, _request: IncomingRequest) -> HandlerFuture {
        let path = parts.uri.path().to_owned();
        Box::pin(async move { Err(RestError::not_found(&path)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct PanickingHandler;

    impl RestHandler for PanickingHandler {
        fn handle(&self, _parts: http::request::Parts, _request: IncomingRequest) -> HandlerFuture {
            Box::pin(async { panic!("handler failure") })
        }
    }

    fn parts(path: &str) -> http::request::Parts {
        let (parts, ()) = http::Request::builder()
            .uri(path)
            .body(())
            .expect("valid request")
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_should_return_not_found_from_default_handler() {
        let err = dispatch_request(&NotFoundHandler, parts("/nowhere"), IncomingRequest::default())
            .await
            .expect_err("should be not found");
        assert_eq!(err.status, http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_turn_handler_panic_into_internal_error() {
        let err = dispatch_request(&PanickingHandler, parts("/boom"), IncomingRequest::default())
            .await
            .expect_err("should fail closed");
        assert_eq!(err.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
