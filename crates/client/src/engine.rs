//! Query engine: hostname in, cache entry out.
//!
//! One lookup per hostname, batching every active source domain into a single
//! upstream request. The result is written to the cache under the version that
//! was current when the request was built.

use std::sync::Arc;

use repute_core::registry::normalize_domain;
use repute_core::{AppConfig, CacheDb, CacheEntry, SourceRegistry};

use crate::{LookupRequest, ReputationLookup, UpstreamError};

/// Knobs the engine reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub model: String,
    pub max_providers: usize,
    pub max_bullets: usize,
    pub max_words: usize,
    pub auto_add_sources: bool,
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_providers: config.max_providers,
            max_bullets: config.max_bullets,
            max_words: config.max_words,
            auto_add_sources: config.auto_add_sources,
        }
    }
}

/// Result of a successful query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// A fresh entry was written.
    Stored(CacheEntry),
    /// No lookup service is configured; nothing was written.
    Unconfigured,
}

/// Errors from a query.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] repute_core::Error),
}

impl EngineError {
    /// Whether the query may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Upstream(e) if e.is_retryable())
    }

    /// HTTP status of the upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Upstream(e) => e.status(),
            EngineError::Store(_) => None,
        }
    }
}

/// Issues lookups and persists their results.
#[derive(Clone)]
pub struct QueryEngine {
    lookup: Option<Arc<dyn ReputationLookup>>,
    db: CacheDb,
    registry: SourceRegistry,
    settings: EngineSettings,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("configured", &self.lookup.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Sanitize configured source domains for use in a request.
///
/// Drops entries that sanitize to nothing and repeats, keeping priority order.
pub fn sanitize_domains<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for domain in domains {
        let clean = normalize_domain(domain.as_ref());
        if !clean.is_empty() && !out.contains(&clean) {
            out.push(clean);
        }
    }
    out
}

impl QueryEngine {
    /// `lookup` is `None` when no API key is configured.
    pub fn new(
        lookup: Option<Arc<dyn ReputationLookup>>, db: CacheDb, registry: SourceRegistry, settings: EngineSettings,
    ) -> Self {
        Self { lookup, db, registry, settings }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Version tag for entries produced under the current configuration.
    ///
    /// Changes when the model, summary limits, or operator settings change.
    pub async fn current_version(&self) -> Result<String, repute_core::Error> {
        let revision = self
            .db
            .settings_changed_at()
            .await?
            .map_or(0, |ts| ts.timestamp_millis());
        Ok(format!(
            "{}|b{}w{}|{}",
            self.settings.model, self.settings.max_bullets, self.settings.max_words, revision
        ))
    }

    /// Look up `hostname` and store the result.
    pub async fn query(&self, hostname: &str) -> Result<QueryOutcome, EngineError> {
        let Some(lookup) = &self.lookup else {
            tracing::warn!(hostname, "no API key configured; skipping lookup");
            return Ok(QueryOutcome::Unconfigured);
        };

        let version = self.current_version().await?;
        let source_domains = sanitize_domains(self.registry.active_domains(self.settings.max_providers).await?);

        let request = LookupRequest {
            hostname: hostname.to_string(),
            source_domains,
            max_bullets: self.settings.max_bullets,
            max_words: self.settings.max_words,
        };

        if request.is_source_only() {
            tracing::debug!(hostname, "no active sources; checking whether hostname is a review site");
        }

        let response = lookup.lookup(&request).await?;

        let reviews = if request.is_source_only() { Vec::new() } else { response.reviews };

        let entry = self
            .db
            .put_entry(hostname, reviews, response.is_source, &version, response.grounding_metadata)
            .await?;

        tracing::info!(hostname, reviews = entry.reviews.len(), is_source = entry.is_source, "stored lookup result");

        if entry.is_source
            && self.settings.auto_add_sources
            && let Err(e) = self.registry.auto_add(hostname).await
        {
            tracing::warn!(hostname, error = %e, "failed to auto-add review source");
        }

        Ok(QueryOutcome::Stored(entry))
    }
}
