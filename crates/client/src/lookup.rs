//! The reputation lookup seam.
//!
//! The query engine only talks to [`ReputationLookup`]; the Gemini client is
//! one implementation and tests provide stubs.

use async_trait::async_trait;
use repute_core::Review;

use crate::UpstreamError;

/// What to ask the reputation service about a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub hostname: String,
    /// Sanitized review sites to consult. Empty means only `is_source` is wanted.
    pub source_domains: Vec<String>,
    pub max_bullets: usize,
    pub max_words: usize,
}

impl LookupRequest {
    /// Whether this request only asks if the hostname is itself a review site.
    pub fn is_source_only(&self) -> bool {
        self.source_domains.is_empty()
    }
}

/// Normalized answer from the reputation service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResponse {
    pub reviews: Vec<Review>,
    pub is_source: bool,
    pub grounding_metadata: Option<serde_json::Value>,
}

/// An external service that rates a hostname against trusted sources.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, UpstreamError>;
}
