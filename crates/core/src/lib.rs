//! Core types and shared functionality for the Driver Shield offline worker.
//!
//! This crate provides:
//! - Request/response snapshots
//! - Versioned cache storage with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;

pub use cache::{CacheDb, CacheStore, CachedKey, StoreState};
pub use config::{ConfigError, RouteTable, Strategy, WorkerConfig};
pub use error::Error;
pub use message::{OFFLINE_BODY, Request, Response, ResponseType};
