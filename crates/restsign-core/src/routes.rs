//! Route table configuration.
//!
//! The route table is the two-tier "ignore sign" override: an endpoint group
//! may set `ignoreSign` for everything under its path prefix, and an
//! individual route inside the group may override it. Each group also names
//! the log level of its audit logger.
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "name": "widgets",
//!       "prefix": "/api/widgets",
//!       "ignoreSign": false,
//!       "logLevel": "info",
//!       "routes": [
//!         { "method": "GET", "path": "/api/widgets/ping", "ignoreSign": true }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RestSignError, RestSignResult};

/// The whole route table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTableConfig {
    /// Endpoint groups, matched by path prefix.
    #[serde(default)]
    pub groups: Vec<EndpointGroupConfig>,
}

/// A group of endpoints sharing a path prefix, an audit logger and a default sign policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointGroupConfig {
    /// Group name; the audit logger is called `rest.<name>`.
    pub name: String,
    /// Path prefix owned by this group.
    pub prefix: String,
    /// Group-level ignore-sign decision.
    #[serde(default)]
    pub ignore_sign: Option<bool>,
    /// Level filter of the group's audit logger (`off`, `error`, ..., `trace`).
    #[serde(default)]
    pub log_level: Option<String>,
    /// Route-level overrides.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// A single route inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// HTTP method, compared case-insensitively.
    pub method: String,
    /// Exact request path.
    pub path: String,
    /// Route-level ignore-sign decision; overrides the group's.
    #[serde(default)]
    pub ignore_sign: Option<bool>,
}

impl RouteTableConfig {
    /// Parse a route table from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RestSignError::InvalidRouteTable`] if the JSON does not match the schema.
    pub fn from_json(json: &str) -> RestSignResult<Self> {
        let table: Self = serde_json::from_str(json)?;
        debug!(groups = table.groups.len(), "parsed route table");
        Ok(table)
    }

    /// Load a route table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RestSignError::RouteTableIo`] if the file cannot be read, or
    /// [`RestSignError::InvalidRouteTable`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> RestSignResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RestSignError::RouteTableIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}
