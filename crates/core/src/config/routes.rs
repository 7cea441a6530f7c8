//! Data-driven route classification.
//!
//! Each same-origin request path is matched against an ordered rule list;
//! the first matching rule picks the caching strategy, otherwise the
//! table's default applies.

use serde::{Deserialize, Serialize};

/// How an in-scope request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serve from the store; fetch and store on a miss.
    CacheFirst,
    /// Fetch first; fall back to the store on network failure. Never writes.
    NetworkFirst,
    /// Do not intercept; the host performs its default network handling.
    Passthrough,
}

/// How a rule matches a request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMatch {
    /// The path contains this segment anywhere (e.g. `/api/`).
    Contains(String),
    /// The path starts with this prefix (e.g. `/static/`).
    Prefix(String),
}

impl RouteMatch {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RouteMatch::Contains(segment) => path.contains(segment.as_str()),
            RouteMatch::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    pub(crate) fn pattern(&self) -> &str {
        match self {
            RouteMatch::Contains(s) | RouteMatch::Prefix(s) => s,
        }
    }
}

/// One entry of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    #[serde(rename = "match")]
    pub matcher: RouteMatch,
    pub strategy: Strategy,
}

impl RouteRule {
    pub fn new(matcher: RouteMatch, strategy: Strategy) -> Self {
        Self { matcher, strategy }
    }
}

/// Ordered route rules plus the fallback strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    #[serde(default = "default_strategy")]
    pub default: Strategy,
}

fn default_strategy() -> Strategy {
    Strategy::CacheFirst
}

impl Default for RouteTable {
    /// API paths go network-first, everything else cache-first.
    fn default() -> Self {
        Self {
            rules: vec![
                RouteRule::new(RouteMatch::Contains("/api/".into()), Strategy::NetworkFirst),
                RouteRule::new(RouteMatch::Prefix("/static/".into()), Strategy::CacheFirst),
            ],
            default: Strategy::CacheFirst,
        }
    }
}

impl RouteTable {
    /// Only `/static/` is intercepted; every other path passes through.
    pub fn static_only() -> Self {
        Self {
            rules: vec![RouteRule::new(RouteMatch::Prefix("/static/".into()), Strategy::CacheFirst)],
            default: Strategy::Passthrough,
        }
    }

    pub fn classify(&self, path: &str) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map_or(self.default, |rule| rule.strategy)
    }
}
