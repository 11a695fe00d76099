//! Core configuration, route table, and shared types for RestSign.
//!
//! This crate holds the pieces every RestSign component reads but none of them
//! owns: the environment-driven [`RestSignConfig`], the JSON route table that
//! decides which endpoints enforce request signatures, and the
//! [`CorrelationId`] that ties a request audit line to its response line.

mod config;
mod error;
mod routes;
mod types;

pub use config::RestSignConfig;
pub use error::{RestSignError, RestSignResult};
pub use routes::{EndpointGroupConfig, RouteConfig, RouteTableConfig};
pub use types::CorrelationId;
