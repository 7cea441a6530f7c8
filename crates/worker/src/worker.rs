//! The worker unit: immutable configuration plus injected capabilities.

use std::sync::Arc;

use shield_client::Network;
use shield_core::{CacheDb, ConfigError, WorkerConfig};
use url::Url;

use crate::host::Host;

/// One deployed version of the offline cache manager.
///
/// Cloning is cheap; the host may run handlers for different events
/// concurrently on clones of the same worker.
#[derive(Clone)]
pub struct ServiceWorker {
    pub(crate) config: Arc<WorkerConfig>,
    pub(crate) origin: Url,
    pub(crate) cache: CacheDb,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) host: Arc<dyn Host>,
}

impl ServiceWorker {
    /// Build a worker from loaded configuration and its capabilities.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configured origin does not parse.
    pub fn new(
        config: Arc<WorkerConfig>, cache: CacheDb, network: Arc<dyn Network>, host: Arc<dyn Host>,
    ) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;
        Ok(Self { config, origin, cache, network, host })
    }

    /// Version tag, which is also this worker's store name.
    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("version", &self.config.version)
            .field("origin", &self.origin.as_str())
            .finish_non_exhaustive()
    }
}
