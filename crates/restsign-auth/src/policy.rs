//! Per-endpoint enforcement decisions and audit loggers.
//!
//! The route table's two tiers (group-level and route-level `ignoreSign`) are
//! flattened once at startup into a [`PolicyTable`]. Lookups at request time
//! only read the table, so it can be shared across connections behind an
//! `Arc` without locking.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use restsign_core::{RestSignError, RestSignResult, RouteTableConfig};
use tracing::debug;
use tracing::level_filters::LevelFilter;

/// Name of the logger used by endpoints outside every configured group.
pub const DEFAULT_LOGGER: &str = "rest.default";

/// Named audit logger of an endpoint group, with its own level filter.
#[derive(Debug, Clone)]
pub struct EndpointLogger {
    name: Arc<str>,
    level: LevelFilter,
}

impl EndpointLogger {
    /// Create a logger handle.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, level: LevelFilter) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// Logger name, emitted as the `logger` field of audit records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Level filter of this logger.
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Whether audit records at `INFO` are written for this endpoint.
    #[must_use]
    pub fn is_info_enabled(&self) -> bool {
        self.level >= LevelFilter::INFO
    }
}

/// Resolved policy for one endpoint.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Whether a valid signature is mandatory.
    pub enforce: bool,
    /// The endpoint's audit logger.
    pub logger: EndpointLogger,
}

impl RoutePolicy {
    /// Create a policy.
    #[must_use]
    pub fn new(enforce: bool, logger: EndpointLogger) -> Self {
        Self { enforce, logger }
    }
}

/// Flat lookup table from endpoint to [`RoutePolicy`].
///
/// Resolution order: exact `(METHOD, path)` route, then the group with the
/// longest matching path prefix, then the default policy.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    routes: HashMap<(String, String), RoutePolicy>,
    groups: Vec<(String, RoutePolicy)>,
    fallback: RoutePolicy,
}

impl PolicyTable {
    /// A table with no groups: every endpoint gets the default policy.
    #[must_use]
    pub fn with_default(default_ignore_sign: bool) -> Self {
        Self {
            routes: HashMap::new(),
            groups: Vec::new(),
            fallback: RoutePolicy::new(
                !default_ignore_sign,
                EndpointLogger::new(DEFAULT_LOGGER, LevelFilter::INFO),
            ),
        }
    }

    /// Flatten a route table.
    ///
    /// A route's own `ignoreSign` wins over its group's; when neither says
    /// anything, `default_ignore_sign` applies.
    ///
    /// # Errors
    ///
    /// Returns [`RestSignError::Config`] if a group's log level cannot be parsed.
    pub fn resolve(config: &RouteTableConfig, default_ignore_sign: bool) -> RestSignResult<Self> {
        let mut table = Self::with_default(default_ignore_sign);

        for group in &config.groups {
            let level = match group.log_level.as_deref() {
                Some(level) => LevelFilter::from_str(level).map_err(|_| {
                    RestSignError::Config(format!(
                        "invalid log level {level:?} for group {}",
                        group.name
                    ))
                })?,
                None => LevelFilter::INFO,
            };
            let logger = EndpointLogger::new(format!("rest.{}", group.name), level);
            let group_ignore = group.ignore_sign.unwrap_or(default_ignore_sign);

            for route in &group.routes {
                let ignore = route.ignore_sign.unwrap_or(group_ignore);
                table.routes.insert(
                    (route.method.to_ascii_uppercase(), route.path.clone()),
                    RoutePolicy::new(!ignore, logger.clone()),
                );
            }
            table
                .groups
                .push((group.prefix.clone(), RoutePolicy::new(!group_ignore, logger)));
        }

        // Longest prefix first.
        table
            .groups
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        debug!(
            routes = table.routes.len(),
            groups = table.groups.len(),
            "resolved sign policy table"
        );
        Ok(table)
    }

    /// Policy for a request.
    #[must_use]
    pub fn lookup(&self, method: &str, path: &str) -> &RoutePolicy {
        if let Some(policy) = self
            .routes
            .get(&(method.to_ascii_uppercase(), path.to_owned()))
        {
            return policy;
        }
        self.groups
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map_or(&self.fallback, |(_, policy)| policy)
    }
}

/// Whether `path` lies under `prefix` on a segment boundary.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PolicyTable {
        let config = RouteTableConfig::from_json(
            r#"{
                "groups": [
                    {
                        "name": "widgets",
                        "prefix": "/api/widgets",
                        "ignoreSign": false,
                        "routes": [
                            { "method": "get", "path": "/api/widgets/ping", "ignoreSign": true },
                            { "method": "POST", "path": "/api/widgets/bulk" }
                        ]
                    },
                    { "name": "api", "prefix": "/api", "logLevel": "off" },
                    { "name": "quiet", "prefix": "/quiet", "ignoreSign": false, "logLevel": "warn" }
                ]
            }"#,
        )
        .expect("valid table");
        PolicyTable::resolve(&config, true).expect("resolvable table")
    }

    #[test]
    fn test_should_let_route_override_group() {
        let table = table();
        assert!(!table.lookup("GET", "/api/widgets/ping").enforce);
        assert!(table.lookup("POST", "/api/widgets/bulk").enforce);
    }

    #[test]
    fn test_should_fall_back_to_group_policy() {
        let table = table();
        let policy = table.lookup("DELETE", "/api/widgets/7");
        assert!(policy.enforce);
        assert_eq!(policy.logger.name(), "rest.widgets");
    }

    #[test]
    fn test_should_prefer_longest_prefix() {
        let table = table();
        assert_eq!(table.lookup("GET", "/api/widgets").logger.name(), "rest.widgets");
        assert_eq!(table.lookup("GET", "/api/gadgets").logger.name(), "rest.api");
    }

    #[test]
    fn test_should_match_prefix_on_segment_boundary() {
        let table = table();
        assert_eq!(
            table.lookup("GET", "/api/widgetsx").logger.name(),
            "rest.api"
        );
        assert_eq!(table.lookup("GET", "/apix").logger.name(), DEFAULT_LOGGER);
    }

    #[test]
    fn test_should_use_default_when_nothing_matches() {
        let table = table();
        let policy = table.lookup("GET", "/other");
        assert!(!policy.enforce);
        assert!(policy.logger.is_info_enabled());

        let strict = PolicyTable::with_default(false);
        assert!(strict.lookup("GET", "/other").enforce);
    }

    #[test]
    fn test_should_apply_group_log_levels() {
        let table = table();
        assert!(!table.lookup("GET", "/api/x").logger.is_info_enabled());
        assert!(!table.lookup("GET", "/quiet").logger.is_info_enabled());
        assert_eq!(table.lookup("GET", "/quiet").logger.level(), LevelFilter::WARN);
    }

    #[test]
    fn test_should_reject_invalid_log_level() {
        let config = RouteTableConfig::from_json(
            r#"{"groups": [{"name": "x", "prefix": "/x", "logLevel": "loud"}]}"#,
        )
        .expect("valid json");
        assert!(matches!(
            PolicyTable::resolve(&config, true),
            Err(RestSignError::Config(_))
        ));
    }
}
