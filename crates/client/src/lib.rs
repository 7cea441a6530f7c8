//! Network capability for the Driver Shield offline worker.
//!
//! This crate provides the `Network` trait the worker fetches through, a
//! reqwest-backed implementation, and URL helpers for origin checks.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, NetworkError};
pub use fetch::url::{UrlError, canonicalize, resolve, same_origin};
