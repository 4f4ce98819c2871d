//! Client code for repute.
//!
//! This crate provides the upstream reputation lookup (trait plus a Gemini
//! implementation), URL-to-hostname handling, and the query engine that turns
//! a hostname into a stored cache entry.

pub mod engine;
pub mod error;
pub mod gemini;
pub mod host;
pub mod lookup;

pub use engine::{EngineError, EngineSettings, QueryEngine, QueryOutcome};
pub use error::UpstreamError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use host::{UrlError, hostname_of};
pub use lookup::{LookupRequest, LookupResponse, ReputationLookup};
