//! HTTP layer for RestSign: request conversion, signature enforcement and
//! dispatch, packaged as a hyper service.
//!
//! - **Request conversion** ([`request`]): Turns request parts and the collected
//!   body into an [`IncomingRequest`](restsign_auth::IncomingRequest), decoding
//!   query, form and multipart parameters ([`multipart`]).
//!
//! - **Dispatch** ([`dispatch`]): Hands verified requests to the application via
//!   the [`RestHandler`](dispatch::RestHandler) trait.
//!
//! - **Errors** ([`error`]): Renders rejections and failures as plain-text
//!   responses.
//!
//! - **Service** ([`service`]): [`RestSignService`](service::RestSignService)
//!   implements hyper's `Service` trait and ties the pieces together.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> RestSignService (hyper Service)
//!     -> Health check interception
//!     -> Body collection
//!     -> IncomingRequest conversion
//!     -> PolicyTable lookup
//!     -> RequestAuditor (canonicalize, log, verify)
//!     -> 416 rejection | dispatch_request (RestHandler trait)
//!     -> RequestAuditor completion hook
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use restsign_auth::{FileDigestor, PolicyTable, RequestAuditor};
//! use restsign_http::dispatch::NotFoundHandler;
//! use restsign_http::service::{RestSignHttpConfig, RestSignService};
//!
//! let auditor = RequestAuditor::new(b"secret".to_vec(), FileDigestor::default());
//! let service = RestSignService::new(
//!     NotFoundHandler,
//!     auditor,
//!     PolicyTable::with_default(false),
//!     RestSignHttpConfig::default(),
//! );
//! // Use `service` with hyper server.
//! ```

pub mod body;
pub mod dispatch;
pub mod error;
pub mod multipart;
pub mod request;
pub mod service;

pub use body::RestResponseBody;
pub use dispatch::{HandlerFuture, NotFoundHandler, RestHandler};
pub use error::RestError;
pub use service::{RestSignHttpConfig, RestSignService};
