//! SQLite-backed store for reputation lookups and settings.
//!
//! This module provides a persistent cache keyed by hostname using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Versioned entries (a model/settings change invalidates old results)
//! - Soft staleness and hard expiry thresholds
//! - A key-value settings table holding the source registry
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod settings;

pub use crate::Error;

pub use connection::{CacheDb, CacheTtl};
pub use entries::{CacheEntry, CachedEntry, Review};
