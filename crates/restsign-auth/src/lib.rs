//! HMAC-SHA256 request signing and audit logging for RestSign.
//!
//! This crate implements the verification side of the RestSign protocol: an
//! inbound request is flattened into a `$`-delimited canonical string, the
//! string is signed with HMAC-SHA256 under a shared secret, and the result is
//! compared with the base64 signature the client sent in the `hisv` header.
//! While the canonical string is built, a second, size-bounded copy is
//! produced for the audit log; truncation only ever touches that copy.
//!
//! # Canonical string
//!
//! ```text
//! METHOD$
//! FULL_URL[?QUERY]$
//! header-name$value$value$...        (transport order, filtered set removed)
//! param-name$value$value$...         (sorted by name, query parameters removed)
//! ```
//!
//! JSON bodies of `POST` requests appear as the `_json` parameter, and uploaded
//! files appear as their content digests, never as raw bytes.
//!
//! # Usage
//!
//! ```rust
//! use restsign_auth::{FileDigestor, IncomingRequest, PolicyTable, RequestAuditor, SignatureOutcome};
//!
//! let auditor = RequestAuditor::new(b"secret".to_vec(), FileDigestor::default());
//! let request = IncomingRequest::new("GET", "http://localhost/api/widgets").with_query("id=7");
//! let signature = auditor.sign_request(&request);
//!
//! let signed = request.with_header("hisv", signature);
//! let policies = PolicyTable::with_default(false);
//! let ctx = auditor.audit(&signed, policies.lookup("GET", "/api/widgets"));
//! assert_eq!(ctx.outcome(), SignatureOutcome::Valid);
//! ```
//!
//! # Modules
//!
//! - [`auditor`] - Per-request orchestration, outcome, and completion logging
//! - [`canonical`] - Canonical string construction
//! - [`digest`] - Uploaded file fingerprints
//! - [`error`] - Authentication error types
//! - [`policy`] - Resolved per-endpoint enforcement and audit loggers
//! - [`request`] - The buffered request snapshot
//! - [`signature`] - HMAC-SHA256 signing and verification
//! - [`sink`] - Dual-stream writer for signing and logging

pub mod auditor;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod policy;
pub mod request;
pub mod signature;
pub mod sink;

pub use auditor::{AuditContext, AuditState, RequestAuditor, ResponseSummary, SignatureOutcome};
pub use digest::{FileDigestAlgorithm, FileDigestor};
pub use error::AuthError;
pub use policy::{EndpointLogger, PolicyTable, RoutePolicy};
pub use request::{IncomingRequest, UploadedFile};
pub use signature::{SIGNATURE_HEADER, sign, verify};
pub use sink::{AbbreviatingSink, LogBuffer, SigningBuffer};
