//! Core types and shared functionality for repute.
//!
//! This crate provides:
//! - SQLite-backed store for cached reputation entries and settings
//! - Trusted source registry (migration, selection, visit tracking)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;

pub use cache::{CacheDb, CacheEntry, CacheTtl, CachedEntry, Review};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use registry::{RawSource, SourceRecord, SourceRegistry, SourceState};

/// Identifier of the browser tab a result is delivered to.
pub type TabId = i64;
