//! Common type definitions shared across RestSign crates.

use std::fmt;

/// Opaque identifier correlating a request audit record with its response record.
///
/// Clients may supply one through the `hici` header; otherwise a UUID v4 is
/// generated. The id only appears in logs, never in responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Request header carrying a client-supplied correlation id.
    pub const HEADER: &str = "hici";

    /// Use the client-supplied id when it is non-empty, otherwise generate one.
    #[must_use]
    pub fn from_header_or_generate(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self(v.to_owned()),
            _ => Self::generate(),
        }
    }

    /// Generate a fresh random correlation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the correlation id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
