//! The RestSign HTTP service implementing hyper's `Service` trait.
//!
//! [`RestSignService`] runs every request through the same pipeline:
//!
//! 1. Health check interception (`GET /health`)
//! 2. Request body collection
//! 3. Conversion into an [`IncomingRequest`]
//! 4. Endpoint policy lookup
//! 5. Canonicalization, audit logging and signature verification
//! 6. Rejection (416) or dispatch to the [`RestHandler`]
//! 7. Response audit logging (completion hook)

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, error, info};

use restsign_auth::{AuthError, IncomingRequest, PolicyTable, RequestAuditor, ResponseSummary};

use crate::body::RestResponseBody;
use crate::dispatch::{RestHandler, dispatch_request};
use crate::error::RestError;
use crate::request::build_incoming;

/// Configuration for the RestSign HTTP service.
#[derive(Debug, Clone)]
pub struct RestSignHttpConfig {
    /// Scheme used to rebuild the full URL of origin-form requests.
    pub public_scheme: String,
}

impl Default for RestSignHttpConfig {
    fn default() -> Self {
        Self {
            public_scheme: "http".to_owned(),
        }
    }
}

/// The hyper service enforcing signatures in front of a [`RestHandler`].
///
/// # Type Parameters
///
/// - `H`: The business logic handler implementing [`RestHandler`].
#[derive(Debug)]
pub struct RestSignService<H: RestHandler> {
    handler: Arc<H>,
    auditor: Arc<RequestAuditor>,
    policies: Arc<PolicyTable>,
    config: Arc<RestSignHttpConfig>,
}

impl<H: RestHandler> RestSignService<H> {
    /// Create a service from its handler, auditor, policy table and configuration.
    #[must_use]
    pub fn new(
        handler: H,
        auditor: RequestAuditor,
        policies: PolicyTable,
        config: RestSignHttpConfig,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            auditor: Arc::new(auditor),
            policies: Arc::new(policies),
            config: Arc::new(config),
        }
    }

    /// Run an already-collected request through the pipeline.
    pub async fn process_collected(
        &self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> http::Response<RestResponseBody> {
        process_collected(
            parts,
            body,
            self.handler.as_ref(),
            &self.auditor,
            &self.policies,
            &self.config,
        )
        .await
    }
}

impl<H: RestHandler> Clone for RestSignService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            auditor: Arc::clone(&self.auditor),
            policies: Arc::clone(&self.policies),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: RestHandler> Service<http::Request<Incoming>> for RestSignService<H> {
    type Response = http::Response<RestResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();

        Box::pin(async move {
            let response = service.process_request(req).await;
            Ok(add_common_headers(response))
        })
    }
}

impl<H: RestHandler> RestSignService<H> {
    async fn process_request(&self, req: http::Request<Incoming>) -> http::Response<RestResponseBody> {
        debug!(method = %req.method(), uri = %req.uri(), "processing request");

        if is_health_check(req.method(), req.uri().path()) {
            return health_check_response();
        }

        let (parts, incoming) = req.into_parts();
        let body = match collect_body(incoming).await {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "failed to collect request body");
                return RestError::from(AuthError::BodyRead(err.to_string())).into_response();
            }
        };

        self.process_collected(parts, body).await
    }
}

async fn process_collected<H: RestHandler>(
    parts: http::request::Parts,
    body: Bytes,
    handler: &H,
    auditor: &RequestAuditor,
    policies: &PolicyTable,
    config: &RestSignHttpConfig,
) -> http::Response<RestResponseBody> {
    let request = match build_incoming(&parts, body, &config.public_scheme) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, path = parts.uri.path(), "failed to read request");
            return RestError::from(err).into_response();
        }
    };

    let policy = policies.lookup(parts.method.as_str(), parts.uri.path());
    let mut ctx = auditor.audit(&request, policy);

    let response = match ctx.outcome().into_result() {
        Err(rejection) => {
            info!(
                correlation_id = %ctx.correlation_id(),
                path = parts.uri.path(),
                reason = %rejection,
                "request rejected"
            );
            RestError::from(rejection).into_response()
        }
        Ok(()) => dispatch(handler, parts, request).await,
    };

    auditor.complete(
        &mut ctx,
        &ResponseSummary {
            status: response.status(),
            headers: response.headers(),
            body: response.body().as_bytes(),
        },
    );

    response
}

async fn dispatch<H: RestHandler>(
    handler: &H,
    parts: http::request::Parts,
    request: IncomingRequest,
) -> http::Response<RestResponseBody> {
    match dispatch_request(handler, parts, request).await {
        Ok(response) => response,
        Err(err) => {
            if err.status.is_server_error() {
                error!(status = err.status.as_u16(), error = %err.message, "request failed");
            } else {
                debug!(status = err.status.as_u16(), error = %err.message, "handler returned error");
            }
            err.into_response()
        }
    }
}

/// Collect the full body from a hyper `Incoming` stream into `Bytes`.
async fn collect_body(incoming: Incoming) -> Result<Bytes, hyper::Error> {
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == "/health"
}

fn health_check_response() -> http::Response<RestResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(RestResponseBody::from_string(
            r#"{"status":"running","service":"restsign"}"#,
        ))
        .expect("static health response should be valid")
}

fn add_common_headers(
    mut response: http::Response<RestResponseBody>,
) -> http::Response<RestResponseBody> {
    response
        .headers_mut()
        .insert("Server", http::HeaderValue::from_static("RestSign"));
    response
}
