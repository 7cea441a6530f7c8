//! Setup and activation handlers.
//!
//! ### Setup
//! - Signal skip-waiting, open this version's store for population.
//! - Fetch every manifest asset concurrently; one failure fails setup and
//!   nothing from this attempt is written. An asset that resolves off the
//!   origin, or whose response is not a successful same-origin one, is a
//!   failure too.
//! - Write every entry, then mark the store ready.
//!
//! ### Activation
//! - Retire every store whose name is not this version, concurrently and
//!   best-effort; failures are collected, not fatal.
//! - Signal the host to claim open clients.

use futures_util::future::{join_all, try_join_all};
use serde::Serialize;
use shield_client::{resolve, same_origin};
use shield_core::{Error, Request, Response};

use crate::worker::ServiceWorker;

/// Result of a successful setup phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    /// Absolute URLs stored, in manifest order.
    pub stored: Vec<String>,
}

/// Result of an activation phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    /// Stale stores removed.
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ServiceWorker {
    /// Handle the setup event.
    ///
    /// # Errors
    ///
    /// Returns `Error::SetupFailed` if any manifest asset resolves to another
    /// origin, cannot be fetched, or answers with anything but a successful
    /// `basic` response, or a cache error if writing fails.
    /// Entries already written by a failed write are left in place.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let version = self.version();
        tracing::info!(version, assets = self.config.manifest.len(), "setup started");

        self.host.skip_waiting().await;

        let requests = self
            .config
            .manifest
            .iter()
            .map(|path| {
                let url = resolve(&self.origin, path)
                    .map_err(|e| Error::SetupFailed { path: path.clone(), reason: e.to_string() })?;
                if !same_origin(&url, &self.origin) {
                    return Err(Error::SetupFailed { path: path.clone(), reason: format!("cross-origin asset {url}") });
                }
                Ok((path.as_str(), Request::get(url)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let store = self.cache.begin_install(version).await?;

        let responses =
            try_join_all(requests.iter().map(|(path, request)| self.fetch_manifest_asset(path, request))).await?;

        for ((_, request), response) in requests.iter().zip(&responses) {
            store.put(request, response).await?;
        }

        self.cache.mark_ready(version).await?;

        let stored: Vec<String> = requests.iter().map(|(_, r)| r.url.to_string()).collect();
        tracing::info!(version, stored = stored.len(), "setup complete");

        Ok(InstallReport { version: version.to_string(), stored })
    }

    async fn fetch_manifest_asset(&self, path: &str, request: &Request) -> Result<Response, Error> {
        let response = self
            .network
            .fetch(request)
            .await
            .map_err(|e| Error::SetupFailed { path: path.to_string(), reason: e.to_string() })?;

        if !response.ok() {
            return Err(Error::SetupFailed {
                path: path.to_string(),
                reason: format!("status {}", response.status.as_u16()),
            });
        }
        if !response.is_cacheable() {
            return Err(Error::SetupFailed {
                path: path.to_string(),
                reason: format!("{} response", response.response_type),
            });
        }

        Ok(response)
    }

    /// Handle the activation event.
    ///
    /// # Errors
    ///
    /// Only a failure to list the existing stores is fatal.
    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        let version = self.version();

        let stale: Vec<String> = self
            .cache
            .store_names()
            .await?
            .into_iter()
            .filter(|name| name != version)
            .collect();

        let results = join_all(stale.iter().map(|name| self.cache.retire_store(name))).await;

        let mut report = ActivationReport { version: version.to_string(), ..Default::default() };
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to delete stale store");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        self.host.claim_clients().await;

        tracing::info!(
            version,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activation complete"
        );

        Ok(report)
    }
}
