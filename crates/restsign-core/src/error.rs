//! Error types for the RestSign core.

/// Core error type for RestSign infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum RestSignError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The route table file could not be read.
    #[error("failed to read route table {path}: {source}")]
    RouteTableIo {
        /// Path of the route table file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The route table is not valid JSON or violates the schema.
    #[error("invalid route table: {0}")]
    InvalidRouteTable(#[from] serde_json::Error),
}

/// Convenience result type for RestSign operations.
pub type RestSignResult<T> = Result<T, RestSignError>;
