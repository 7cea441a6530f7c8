//! Host side of the worker contract.
//!
//! [`Host`] is the pair of signals a worker may send during its lifecycle.
//! [`Registration`] is an in-process host: it runs setup and activation for
//! a worker, tracks which version is installing, waiting and active, and
//! dispatches requests to the version that controls clients.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shield_core::{Error, Request, Response};
use tokio::sync::RwLock;

use crate::intercept::{FetchOutcome, ResponseSource};
use crate::lifecycle::{ActivationReport, InstallReport};
use crate::worker::ServiceWorker;

/// Lifecycle signals a worker sends to its host.
#[async_trait]
pub trait Host: Send + Sync {
    /// Activate this version as soon as setup succeeds instead of waiting
    /// for clients of the previous version to close.
    async fn skip_waiting(&self);

    /// Start controlling all open clients now instead of on next navigation.
    async fn claim_clients(&self);
}

/// Versions known to a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationState {
    pub installing: Option<String>,
    pub waiting: Option<String>,
    pub active: Option<String>,
    /// Version currently controlling clients.
    pub controller: Option<String>,
    #[serde(skip)]
    skip_waiting: bool,
}

/// What registering a worker led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The same version is already active; nothing ran.
    AlreadyActive,
    /// Setup succeeded but the previous version stays active.
    Waiting(InstallReport),
    /// Setup and activation both ran.
    Activated { install: InstallReport, activation: ActivationReport },
}

/// A response produced for a dispatched request.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: Response,
    pub source: ResponseSource,
}

/// In-process host driving one worker scope.
#[derive(Clone, Default)]
pub struct Registration {
    state: Arc<RwLock<RegistrationState>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> RegistrationState {
        self.state.read().await.clone()
    }

    /// Install `worker` and activate it when allowed.
    ///
    /// On setup failure the previously active version keeps running.
    pub async fn register(&self, worker: &ServiceWorker) -> Result<RegistrationOutcome, Error> {
        let version = worker.version().to_string();
        {
            let mut state = self.state.write().await;
            if state.active.as_deref() == Some(version.as_str()) {
                tracing::debug!(version = %version, "version already active");
                return Ok(RegistrationOutcome::AlreadyActive);
            }
            state.installing = Some(version.clone());
            state.skip_waiting = false;
        }

        let install = match worker.on_install().await {
            Ok(report) => report,
            Err(e) => {
                let mut state = self.state.write().await;
                state.installing = None;
                tracing::warn!(version = %version, error = %e, active = ?state.active, "setup failed, keeping previous version");
                return Err(e);
            }
        };

        let activate_now = {
            let mut state = self.state.write().await;
            state.installing = None;
            state.waiting = Some(version.clone());
            state.skip_waiting || state.active.is_none()
        };

        if !activate_now {
            tracing::info!(version = %version, "installed, waiting for previous version to release clients");
            return Ok(RegistrationOutcome::Waiting(install));
        }

        let activation = self.activate(worker).await?;
        Ok(RegistrationOutcome::Activated { install, activation })
    }

    /// Activate `worker` if it is the waiting version.
    ///
    /// Returns None when `worker` is not waiting.
    pub async fn activate_waiting(&self, worker: &ServiceWorker) -> Result<Option<ActivationReport>, Error> {
        let is_waiting = self.state.read().await.waiting.as_deref() == Some(worker.version());
        if !is_waiting {
            return Ok(None);
        }
        self.activate(worker).await.map(Some)
    }

    async fn activate(&self, worker: &ServiceWorker) -> Result<ActivationReport, Error> {
        {
            let mut state = self.state.write().await;
            state.waiting = None;
            state.active = Some(worker.version().to_string());
        }
        worker.on_activate().await
    }

    /// Route a client request through the controlling worker.
    ///
    /// Requests arriving while `worker` does not control clients, and
    /// requests the worker declines, get default network handling.
    pub async fn dispatch(&self, worker: &ServiceWorker, request: &Request) -> Result<Dispatched, Error> {
        let controlled = self.state.read().await.controller.as_deref() == Some(worker.version());

        if controlled
            && let FetchOutcome::Respond { response, source } = worker.on_fetch(request).await?
        {
            return Ok(Dispatched { response, source });
        }

        let response = worker.network().fetch(request).await?;
        Ok(Dispatched { response, source: ResponseSource::Passthrough })
    }
}

#[async_trait]
impl Host for Registration {
    async fn skip_waiting(&self) {
        self.state.write().await.skip_waiting = true;
    }

    async fn claim_clients(&self) {
        let mut state = self.state.write().await;
        state.controller = state.active.clone();
        tracing::debug!(controller = ?state.controller, "clients claimed");
    }
}
