//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - a manifest path is not absolute, is scheme-relative (`//host/..`), or
    ///   appears twice
    /// - a route rule has an empty pattern
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }

        self.origin_url()?;

        let mut seen = HashSet::new();
        for path in &self.manifest {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("path must start with '/': {path}"),
                });
            }
            if path.starts_with("//") {
                return Err(ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("path must stay on the origin: {path}"),
                });
            }
            if !seen.insert(path.as_str()) {
                return Err(ConfigError::Invalid { field: "manifest".into(), reason: format!("duplicate path: {path}") });
            }
        }

        if self.routes.rules.iter().any(|rule| rule.matcher.pattern().is_empty()) {
            return Err(ConfigError::Invalid { field: "routes".into(), reason: "rule pattern must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.manifest.is_empty() {
            tracing::warn!(version = %self.version, "manifest is empty; setup will store nothing");
        }

        Ok(())
    }
}
