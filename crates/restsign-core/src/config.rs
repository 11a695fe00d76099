//! Configuration management for RestSign.
//!
//! All configuration is driven by environment variables. The HMAC secret is a
//! plain configuration input; RestSign never rotates or distributes it.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{RestSignError, RestSignResult};

/// Global configuration for RestSign.
///
/// # Examples
///
/// ```
/// use restsign_core::RestSignConfig;
///
/// let config = RestSignConfig::builder().secret("s3cr3t".into()).build();
/// assert_eq!(config.log_value_max_chars, 200);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct RestSignConfig {
    /// Bind address for the gateway (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Shared HMAC-SHA256 secret.
    #[builder(default)]
    #[serde(skip_serializing)]
    pub secret: String,

    /// Optional path of a JSON route table.
    #[builder(default)]
    pub routes_file: Option<String>,

    /// Whether endpoints the route table says nothing about skip signature enforcement.
    #[builder(default = true)]
    pub default_ignore_sign: bool,

    /// Maximum characters of a single parameter value written to the audit log.
    #[builder(default = 200)]
    pub log_value_max_chars: usize,

    /// Maximum characters of a request or response body written to the audit log.
    #[builder(default = 4096)]
    pub log_body_max_chars: usize,

    /// Digest algorithm used to fingerprint uploaded files (`md5` or `sha256`).
    #[builder(default = String::from("md5"))]
    pub file_digest: String,

    /// Scheme used to rebuild the full request URL when the request target is not absolute.
    #[builder(default = String::from("http"))]
    pub public_scheme: String,
}

impl std::fmt::Debug for RestSignConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSignConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("log_level", &self.log_level)
            .field("secret", &"***")
            .field("routes_file", &self.routes_file)
            .field("default_ignore_sign", &self.default_ignore_sign)
            .field("log_value_max_chars", &self.log_value_max_chars)
            .field("log_body_max_chars", &self.log_body_max_chars)
            .field("file_digest", &self.file_digest)
            .field("public_scheme", &self.public_scheme)
            .finish()
    }
}

impl Default for RestSignConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RestSignConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `LOG_LEVEL` | `info` |
    /// | `SIGN_SECRET` | *(empty)* |
    /// | `SIGN_ROUTES_FILE` | *(unset)* |
    /// | `SIGN_DEFAULT_IGNORE` | `true` |
    /// | `SIGN_LOG_VALUE_MAX_CHARS` | `200` |
    /// | `SIGN_LOG_BODY_MAX_CHARS` | `4096` |
    /// | `SIGN_FILE_DIGEST` | `md5` |
    /// | `SIGN_PUBLIC_SCHEME` | `http` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("SIGN_SECRET") {
            config.secret = v;
        }
        if let Ok(v) = std::env::var("SIGN_ROUTES_FILE") {
            if !v.is_empty() {
                config.routes_file = Some(v);
            }
        }
        if let Ok(v) = std::env::var("SIGN_DEFAULT_IGNORE") {
            config.default_ignore_sign = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("SIGN_LOG_VALUE_MAX_CHARS") {
            if let Ok(n) = v.parse::<usize>() {
                config.log_value_max_chars = n;
            }
        }
        if let Ok(v) = std::env::var("SIGN_LOG_BODY_MAX_CHARS") {
            if let Ok(n) = v.parse::<usize>() {
                config.log_body_max_chars = n;
            }
        }
        if let Ok(v) = std::env::var("SIGN_FILE_DIGEST") {
            config.file_digest = v;
        }
        if let Ok(v) = std::env::var("SIGN_PUBLIC_SCHEME") {
            config.public_scheme = v;
        }

        config
    }

    /// Check the settings a running server cannot do without.
    ///
    /// # Errors
    ///
    /// Returns [`RestSignError::Config`] when the secret is empty or the
    /// abbreviation cap is too small to hold the truncation marker.
    pub fn validate(&self) -> RestSignResult<()> {
        if self.secret.is_empty() {
            return Err(RestSignError::Config("SIGN_SECRET must not be empty".to_owned()));
        }
        if self.log_value_max_chars < 4 {
            return Err(RestSignError::Config(format!(
                "SIGN_LOG_VALUE_MAX_CHARS must be at least 4, got {}",
                self.log_value_max_chars
            )));
        }
        Ok(())
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
