//! SQLite-backed cache storage with named, versioned stores.
//!
//! This module persists the browser-style cache storage model using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named stores, at most one per version tag
//! - A forward-only store lifecycle (populating, ready, stale)
//! - Request-keyed response snapshots inside each store
//! - Automatic schema migrations

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheStore, CachedKey};
pub use stores::StoreState;
