//! Offline cache manager for the Driver Shield 360 web front-end.
//!
//! The worker reacts to three host events: setup (install), activation and
//! intercepted requests. Each handler is an async method on [`ServiceWorker`]
//! taking its capabilities (cache storage, network, host signals) from the
//! worker rather than from ambient globals.

pub mod host;
pub mod intercept;
pub mod lifecycle;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use host::{Dispatched, Host, Registration, RegistrationOutcome, RegistrationState};
pub use intercept::{FetchOutcome, ResponseSource};
pub use lifecycle::{ActivationReport, InstallReport};
pub use worker::ServiceWorker;
