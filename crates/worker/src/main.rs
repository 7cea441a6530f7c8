//! shield-sw entry point.
//!
//! Hosts the offline worker over stdio: registers the configured version,
//! then answers `METHOD URL` request lines read from stdin with one JSON
//! line each on stdout. Logging goes to stderr to keep stdout clean.

use std::sync::Arc;

use anyhow::Result;
use shield_client::{FetchClient, FetchConfig};
use shield_core::{CacheDb, WorkerConfig};
use shield_worker::{Registration, RegistrationOutcome, ServiceWorker};
use tracing_subscriber::EnvFilter;

mod stdio;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(WorkerConfig::load()?);
    tracing::info!(version = %config.version, origin = %config.origin, "starting offline worker on stdio");

    let cache = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_worker(&config)?)?);
    let registration = Registration::new();
    let worker = ServiceWorker::new(config, cache, network, Arc::new(registration.clone()))?;

    match registration.register(&worker).await {
        Ok(RegistrationOutcome::Activated { install, activation }) => {
            tracing::info!(
                stored = install.stored.len(),
                deleted = ?activation.deleted,
                failed = activation.failed.len(),
                "worker activated"
            );
        }
        Ok(RegistrationOutcome::Waiting(_)) => tracing::info!("worker installed and waiting"),
        Ok(RegistrationOutcome::AlreadyActive) => {}
        Err(e) => tracing::error!(error = %e, "setup failed, requests will bypass the worker"),
    }

    stdio::serve(registration, worker).await
}
