//! Request interception policy.
//!
//! Cross-origin requests are never touched. Same-origin requests are
//! classified by the route table:
//!
//! - cache-first: serve a stored response without touching the network;
//!   on a miss fetch once, store successful same-origin reads, and answer a
//!   network failure with the synthetic offline response.
//! - network-first: fetch once; on network failure serve a stored response,
//!   else the offline response (or the error, if that fallback is off).
//!   Never writes the store.
//! - passthrough: left to the host's default handling.

use serde::Serialize;
use shield_client::same_origin;
use shield_core::{Error, Request, Response, Strategy};

use crate::worker::ServiceWorker;

/// Where the response to an intercepted request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The synthetic 503 response.
    Offline,
    /// Not intercepted; the host fetched it with default handling.
    Passthrough,
}

/// Decision for one intercepted request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Do not override; the host performs default network handling.
    Passthrough,
    /// Use this response instead of the default.
    Respond { response: Response, source: ResponseSource },
}

impl FetchOutcome {
    fn respond(response: Response, source: ResponseSource) -> Self {
        FetchOutcome::Respond { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            FetchOutcome::Passthrough => None,
        }
    }

    pub fn source(&self) -> ResponseSource {
        match self {
            FetchOutcome::Respond { source, .. } => *source,
            FetchOutcome::Passthrough => ResponseSource::Passthrough,
        }
    }
}

impl ServiceWorker {
    /// Handle an intercepted request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` only for a network-first double miss when
    /// the offline fallback is disabled.
    pub async fn on_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if !same_origin(&request.url, &self.origin) {
            tracing::debug!(url = %request.url, "cross-origin request, not intercepted");
            return Ok(FetchOutcome::Passthrough);
        }

        match self.config.routes.classify(request.url.path()) {
            Strategy::Passthrough => Ok(FetchOutcome::Passthrough),
            Strategy::CacheFirst => Ok(self.cache_first(request).await),
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: &Request) -> FetchOutcome {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return FetchOutcome::respond(cached, ResponseSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if request.is_read() && response.is_cacheable() {
                    self.store(request, &response).await;
                }
                FetchOutcome::respond(response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "network failed with no cached copy");
                FetchOutcome::respond(Response::offline(), ResponseSource::Offline)
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let err = match self.network.fetch(request).await {
            Ok(response) => return Ok(FetchOutcome::respond(response, ResponseSource::Network)),
            Err(e) => e,
        };

        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url, error = %err, "network failed, serving cached copy");
            return Ok(FetchOutcome::respond(cached, ResponseSource::Cache));
        }

        if self.config.api_offline_fallback {
            tracing::warn!(url = %request.url, error = %err, "network failed with no cached copy");
            Ok(FetchOutcome::respond(Response::offline(), ResponseSource::Offline))
        } else {
            Err(err.into())
        }
    }

    /// Cache read failures count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.cache.store(self.version()).match_request(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Cache write failures are logged and never fail the request.
    async fn store(&self, request: &Request, response: &Response) {
        let result = match self.cache.open_store(self.version()).await {
            Ok(store) => store.put(request, response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(url = %request.url, error = %e, "failed to store response");
        }
    }
}
