//! Per-request orchestration of canonicalization, verification, and audit logging.
//!
//! Each request moves through
//!
//! ```text
//! Received -> Canonicalized -> SignatureChecked | SignatureSkipped -> Logged -> Completed
//! ```
//!
//! An endpoint that neither enforces signing nor has audit logging enabled
//! skips straight to `Completed`. Audit logging is enabled when the endpoint
//! logger admits `INFO` and the installed subscriber does not filter out
//! `restsign::audit` at that level. Otherwise the canonical string is always
//! built, because the request audit record is derived from it.
//!
//! Audit records are emitted on the `restsign::audit` target and carry the
//! endpoint logger's name and the request's correlation id, so the request
//! record and the response record written by [`RequestAuditor::complete`] can
//! be joined.

use std::fmt::Write as _;
use std::time::Instant;

use restsign_core::{CorrelationId, RestSignConfig};
use tracing::{Level, debug, info};

use crate::canonical::write_canonical;
use crate::digest::FileDigestor;
use crate::error::AuthError;
use crate::policy::{EndpointLogger, RoutePolicy};
use crate::request::IncomingRequest;
use crate::signature::{SIGNATURE_HEADER, sign, verify};
use crate::sink::{AbbreviatingSink, DEFAULT_MAX_CHARS, LogBuffer, SigningBuffer, abbreviate};

/// Tracing target of audit records.
pub const AUDIT_TARGET: &str = "restsign::audit";

/// Logged in place of response bodies that are not text or look like an HTML error page.
pub const IGNORED_BODY: &str = "ignored";

/// Logged in place of an empty or non-textual request body.
pub const EMPTY_BODY: &str = "(empty)";

const DEFAULT_BODY_MAX_CHARS: usize = 4096;

/// Terminal result of the signature check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The endpoint does not enforce signing.
    AllowedNoEnforcement,
    /// The presented signature matched.
    Valid,
    /// No signature was presented.
    Missing,
    /// The presented signature did not match.
    Invalid,
}

impl SignatureOutcome {
    /// Whether the request may proceed to its handler.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::AllowedNoEnforcement | Self::Valid)
    }

    /// Turn a rejecting outcome into its error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingSignature`] or [`AuthError::InvalidSignature`]
    /// for the rejecting outcomes.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::AllowedNoEnforcement | Self::Valid => Ok(()),
            Self::Missing => Err(AuthError::MissingSignature),
            Self::Invalid => Err(AuthError::InvalidSignature),
        }
    }
}

/// Lifecycle state of a request audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    /// The request has arrived.
    Received,
    /// The canonical string has been built.
    Canonicalized,
    /// The signature has been verified.
    SignatureChecked,
    /// The endpoint does not enforce signing.
    SignatureSkipped,
    /// The request audit record has been written.
    Logged,
    /// The response has been recorded.
    Completed,
}

/// Per-request audit state, carried from [`RequestAuditor::audit`] to [`RequestAuditor::complete`].
#[derive(Debug)]
pub struct AuditContext {
    correlation_id: CorrelationId,
    logger: EndpointLogger,
    started: Instant,
    state: AuditState,
    outcome: SignatureOutcome,
}

impl AuditContext {
    fn new(correlation_id: CorrelationId, logger: EndpointLogger) -> Self {
        Self {
            correlation_id,
            logger,
            started: Instant::now(),
            state: AuditState::Received,
            outcome: SignatureOutcome::AllowedNoEnforcement,
        }
    }

    fn advance(&mut self, next: AuditState) {
        debug!(
            correlation_id = %self.correlation_id,
            from = ?self.state,
            to = ?next,
            "audit state transition"
        );
        self.state = next;
    }

    /// The request's correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AuditState {
        self.state
    }

    /// The signature outcome.
    #[must_use]
    pub fn outcome(&self) -> SignatureOutcome {
        self.outcome
    }
}

/// Response metadata captured by the completion hook.
#[derive(Debug, Clone, Copy)]
pub struct ResponseSummary<'a> {
    /// Response status.
    pub status: http::StatusCode,
    /// Response headers.
    pub headers: &'a http::HeaderMap,
    /// Buffered response body, if the body is available.
    pub body: Option<&'a [u8]>,
}

/// Drives canonicalization and verification for each request.
///
/// The auditor is immutable once built and is shared by all requests.
#[derive(Clone)]
pub struct RequestAuditor {
    secret: Vec<u8>,
    digestor: FileDigestor,
    log_value_max_chars: usize,
    log_body_max_chars: usize,
}

impl std::fmt::Debug for RequestAuditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuditor")
            .field("secret", &"***")
            .field("digestor", &self.digestor)
            .field("log_value_max_chars", &self.log_value_max_chars)
            .field("log_body_max_chars", &self.log_body_max_chars)
            .finish()
    }
}

impl RequestAuditor {
    /// Create an auditor with the default log caps.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, digestor: FileDigestor) -> Self {
        Self {
            secret: secret.into(),
            digestor,
            log_value_max_chars: DEFAULT_MAX_CHARS,
            log_body_max_chars: DEFAULT_BODY_MAX_CHARS,
        }
    }

    /// Create an auditor from the RestSign configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Digest`] if the configured file digest is not supported.
    pub fn from_config(config: &RestSignConfig) -> Result<Self, AuthError> {
        let digestor = FileDigestor::from_name(&config.file_digest)?;
        Ok(Self::new(config.secret.as_bytes(), digestor)
            .with_log_limits(config.log_value_max_chars, config.log_body_max_chars))
    }

    /// Override the per-value and per-body character caps of audit records.
    #[must_use]
    pub fn with_log_limits(mut self, value_max_chars: usize, body_max_chars: usize) -> Self {
        self.log_value_max_chars = value_max_chars;
        self.log_body_max_chars = body_max_chars;
        self
    }

    /// Build the signing and log buffers of a request.
    #[must_use]
    pub fn canonicalize(&self, request: &IncomingRequest) -> (SigningBuffer, LogBuffer) {
        let mut sink = AbbreviatingSink::new(self.log_value_max_chars);
        write_canonical(request, &self.digestor, &mut sink);
        sink.finish()
    }

    /// Compute the `hisv` value a client must send with `request`.
    #[must_use]
    pub fn sign_request(&self, request: &IncomingRequest) -> String {
        let (signing, _) = self.canonicalize(request);
        sign(signing.as_str(), &self.secret)
    }

    /// Audit a request under the given endpoint policy.
    ///
    /// Missing and invalid signatures are reported through
    /// [`AuditContext::outcome`]; turning them into a response is up to the
    /// caller.
    #[must_use]
    pub fn audit(&self, request: &IncomingRequest, policy: &RoutePolicy) -> AuditContext {
        let correlation_id =
            CorrelationId::from_header_or_generate(request.header(CorrelationId::HEADER));
        let mut ctx = AuditContext::new(correlation_id, policy.logger.clone());
        let log_enabled = audit_logging_enabled(&ctx.logger);

        if !policy.enforce && !log_enabled {
            ctx.advance(AuditState::Completed);
            return ctx;
        }

        let (signing, log) = self.canonicalize(request);
        ctx.advance(AuditState::Canonicalized);

        if log_enabled {
            info!(
                target: AUDIT_TARGET,
                logger = ctx.logger.name(),
                correlation_id = %ctx.correlation_id,
                request = %log,
                body = %self.request_body_for_log(request),
                "rest request"
            );
        }

        if policy.enforce {
            ctx.outcome = self.check_signature(request, &signing);
            ctx.advance(AuditState::SignatureChecked);
            if log_enabled {
                info!(
                    target: AUDIT_TARGET,
                    logger = ctx.logger.name(),
                    correlation_id = %ctx.correlation_id,
                    outcome = ?ctx.outcome,
                    "rest request signature checked"
                );
            }
        } else {
            ctx.advance(AuditState::SignatureSkipped);
        }

        ctx.advance(AuditState::Logged);
        ctx
    }

    /// Record the response of an audited request and mark the audit completed.
    pub fn complete(&self, ctx: &mut AuditContext, response: &ResponseSummary<'_>) {
        if ctx.state == AuditState::Completed {
            return;
        }

        if audit_logging_enabled(&ctx.logger) {
            let elapsed_ms = u64::try_from(ctx.started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(
                target: AUDIT_TARGET,
                logger = ctx.logger.name(),
                correlation_id = %ctx.correlation_id,
                elapsed_ms,
                status = response.status.as_u16(),
                headers = %format_response_headers(response.headers),
                body = %self.response_body_for_log(response),
                "rest response"
            );
        }

        ctx.advance(AuditState::Completed);
    }

    fn check_signature(
        &self,
        request: &IncomingRequest,
        signing: &SigningBuffer,
    ) -> SignatureOutcome {
        match request.header(SIGNATURE_HEADER) {
            None | Some("") => SignatureOutcome::Missing,
            Some(presented) if verify(signing.as_str(), &self.secret, presented) => {
                SignatureOutcome::Valid
            }
            Some(_) => SignatureOutcome::Invalid,
        }
    }

    fn request_body_for_log(&self, request: &IncomingRequest) -> String {
        if request.body.is_empty() || !is_textual(request.content_type()) {
            return EMPTY_BODY.to_owned();
        }
        let text = String::from_utf8_lossy(&request.body);
        abbreviate(&text, self.log_body_max_chars).into_owned()
    }

    fn response_body_for_log(&self, response: &ResponseSummary<'_>) -> String {
        let content_type = response
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let Some(body) = response.body.filter(|_| is_textual(content_type)) else {
            return IGNORED_BODY.to_owned();
        };

        let text = String::from_utf8_lossy(body);
        if text.contains("<html>") {
            return IGNORED_BODY.to_owned();
        }
        abbreviate(&text, self.log_body_max_chars).into_owned()
    }
}

/// Whether audit records for this endpoint reach a subscriber.
///
/// Both the endpoint logger's own level and the installed subscriber's filter
/// on [`AUDIT_TARGET`] must admit `INFO`.
fn audit_logging_enabled(logger: &EndpointLogger) -> bool {
    logger.is_info_enabled() && tracing::enabled!(target: AUDIT_TARGET, Level::INFO)
}

/// Whether a body with this content type is logged as text. A missing content type counts as text.
fn is_textual(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| {
        let ct = ct.to_ascii_lowercase();
        ["json", "xml", "text"].iter().any(|kind| ct.contains(kind))
    })
}

/// Format response headers as `name=v1,v2&...&Content-Type=value`.
fn format_response_headers(headers: &http::HeaderMap) -> String {
    let mut out = String::new();
    for name in headers.keys() {
        if name == http::header::CONTENT_TYPE {
            continue;
        }
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let _ = write!(out, "{name}={values}&");
    }
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();
    let _ = write!(out, "Content-Type={content_type}");
    out
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;
    use crate::policy::PolicyTable;

    const SECRET: &[u8] = b"d51fd93e-f6c9-4eae-ae7a-9b37af1a60cc";

    fn auditor() -> RequestAuditor {
        RequestAuditor::new(SECRET, FileDigestor::default())
    }

    fn policy(enforce: bool, level: LevelFilter) -> RoutePolicy {
        RoutePolicy::new(enforce, EndpointLogger::new("rest.test", level))
    }

    fn widgets_request() -> IncomingRequest {
        IncomingRequest::new("GET", "http://localhost/api/widgets")
            .with_query("id=7")
            .with_param("id", "7")
    }

    fn with_log_filter<T>(filter: &str, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    #[test]
    fn test_should_short_circuit_when_not_enforced_and_not_logged() {
        let ctx = with_log_filter("info", || {
            auditor().audit(&widgets_request(), &policy(false, LevelFilter::OFF))
        });
        assert_eq!(ctx.state(), AuditState::Completed);
        assert_eq!(ctx.outcome(), SignatureOutcome::AllowedNoEnforcement);
    }

    #[test]
    fn test_should_canonicalize_when_logging_without_enforcement() {
        let ctx = with_log_filter("info", || {
            auditor().audit(&widgets_request(), &policy(false, LevelFilter::INFO))
        });
        assert_eq!(ctx.state(), AuditState::Logged);
        assert_eq!(ctx.outcome(), SignatureOutcome::AllowedNoEnforcement);
    }

    #[test]
    fn test_should_short_circuit_when_subscriber_drops_audit_records() {
        let auditor = auditor();
        let quiet = policy(false, LevelFilter::INFO);

        let ctx = with_log_filter("warn", || auditor.audit(&widgets_request(), &quiet));
        assert_eq!(ctx.state(), AuditState::Completed);

        let ctx = with_log_filter("info,restsign::audit=off", || {
            auditor.audit(&widgets_request(), &quiet)
        });
        assert_eq!(ctx.state(), AuditState::Completed);

        let ctx = tracing::subscriber::with_default(
            tracing::subscriber::NoSubscriber::default(),
            || auditor.audit(&widgets_request(), &quiet),
        );
        assert_eq!(ctx.state(), AuditState::Completed);
    }

    #[test]
    fn test_should_pass_through_undecodable_body_when_audit_is_filtered_out() {
        let req = IncomingRequest::new("POST", "http://localhost/api")
            .with_header("content-type", "application/json")
            .with_body(vec![b'{', 0xe9, b'}']);
        let ctx = with_log_filter("warn", || {
            auditor().audit(&req, PolicyTable::with_default(true).lookup("POST", "/api"))
        });
        assert_eq!(ctx.state(), AuditState::Completed);
        assert!(ctx.outcome().is_allowed());
    }

    #[test]
    fn test_should_still_verify_when_subscriber_drops_audit_records() {
        let ctx = with_log_filter("warn", || {
            auditor().audit(&widgets_request(), &policy(true, LevelFilter::INFO))
        });
        assert_eq!(ctx.outcome(), SignatureOutcome::Missing);
    }

    #[test]
    fn test_should_report_missing_signature() {
        let ctx = auditor().audit(&widgets_request(), &policy(true, LevelFilter::INFO));
        assert_eq!(ctx.outcome(), SignatureOutcome::Missing);
        assert!(matches!(
            ctx.outcome().into_result(),
            Err(AuthError::MissingSignature)
        ));
    }

    #[test]
    fn test_should_treat_empty_signature_as_missing() {
        let req = widgets_request().with_header("hisv", "");
        let ctx = auditor().audit(&req, &policy(true, LevelFilter::INFO));
        assert_eq!(ctx.outcome(), SignatureOutcome::Missing);
    }

    #[test]
    fn test_should_accept_valid_signature_even_with_logging_off() {
        let auditor = auditor();
        let sig = auditor.sign_request(&widgets_request());
        let req = widgets_request().with_header("hisv", sig);
        let ctx = auditor.audit(&req, &policy(true, LevelFilter::OFF));
        assert_eq!(ctx.outcome(), SignatureOutcome::Valid);
        assert!(ctx.outcome().is_allowed());
    }

    #[test]
    fn test_should_reject_invalid_signature() {
        let req = widgets_request().with_header("hisv", "bm90IGEgc2lnbmF0dXJl");
        let ctx = auditor().audit(&req, &policy(true, LevelFilter::INFO));
        assert_eq!(ctx.outcome(), SignatureOutcome::Invalid);
        assert!(!ctx.outcome().is_allowed());
    }

    #[test]
    fn test_should_use_client_correlation_id() {
        let req = widgets_request().with_header("hici", "trace-1");
        let ctx = auditor().audit(&req, &policy(false, LevelFilter::INFO));
        assert_eq!(ctx.correlation_id().as_str(), "trace-1");
    }

    #[test]
    fn test_should_complete_audit() {
        let auditor = auditor();
        let table = PolicyTable::with_default(false);
        let mut ctx = auditor.audit(&widgets_request(), table.lookup("GET", "/"));
        let headers = http::HeaderMap::new();
        auditor.complete(
            &mut ctx,
            &ResponseSummary {
                status: http::StatusCode::OK,
                headers: &headers,
                body: Some(b"{}"),
            },
        );
        assert_eq!(ctx.state(), AuditState::Completed);
    }

    #[test]
    fn test_should_build_auditor_from_config() {
        let config = RestSignConfig::builder()
            .secret("abc".into())
            .file_digest("sha256".into())
            .build();
        assert!(RequestAuditor::from_config(&config).is_ok());

        let bad = RestSignConfig::builder()
            .secret("abc".into())
            .file_digest("whirlpool".into())
            .build();
        assert!(matches!(
            RequestAuditor::from_config(&bad),
            Err(AuthError::Digest(_))
        ));
    }

    #[test]
    fn test_should_log_textual_request_bodies_only() {
        let auditor = auditor().with_log_limits(200, 8);
        let json = IncomingRequest::new("POST", "http://localhost/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"widget"}"#);
        assert_eq!(auditor.request_body_for_log(&json), "{\"nam...");

        let binary = IncomingRequest::new("POST", "http://localhost/")
            .with_header("content-type", "application/octet-stream")
            .with_body(vec![1, 2, 3]);
        assert_eq!(auditor.request_body_for_log(&binary), EMPTY_BODY);

        let empty = IncomingRequest::new("GET", "http://localhost/");
        assert_eq!(auditor.request_body_for_log(&empty), EMPTY_BODY);
    }

    #[test]
    fn test_should_ignore_html_and_binary_response_bodies() {
        let auditor = auditor();
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/html"),
        );
        let html = ResponseSummary {
            status: http::StatusCode::NOT_FOUND,
            headers: &headers,
            body: Some(b"<html><body>404</body></html>"),
        };
        assert_eq!(auditor.response_body_for_log(&html), IGNORED_BODY);

        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("image/png"),
        );
        let png = ResponseSummary {
            status: http::StatusCode::OK,
            headers: &headers,
            body: Some(&[0x89, 0x50]),
        };
        assert_eq!(auditor.response_body_for_log(&png), IGNORED_BODY);

        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        let json = ResponseSummary {
            status: http::StatusCode::OK,
            headers: &headers,
            body: Some(br#"{"ok":true}"#),
        };
        assert_eq!(auditor.response_body_for_log(&json), r#"{"ok":true}"#);
    }

    #[test]
    fn test_should_format_response_headers() {
        let mut headers = http::HeaderMap::new();
        headers.append("x-a", http::HeaderValue::from_static("1"));
        headers.append("x-a", http::HeaderValue::from_static("2"));
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain"),
        );
        assert_eq!(
            format_response_headers(&headers),
            "x-a=1,2&Content-Type=text/plain"
        );
        assert_eq!(
            format_response_headers(&http::HeaderMap::new()),
            "Content-Type="
        );
    }
}
