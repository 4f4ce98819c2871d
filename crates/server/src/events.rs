//! Inbound browser events.

use repute_client::{UrlError, hostname_of};
use repute_core::{CachedEntry, Error, TabId};
use serde::Serialize;

use crate::scheduler::Scheduler;

/// What a navigation event led to.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationOutcome {
    pub hostname: String,
    /// Entry delivered to the tab straight from the cache, if any.
    pub cached: Option<CachedEntry>,
    /// A lookup was queued because the entry was missing or stale.
    pub queued: bool,
}

impl Scheduler {
    /// A page finished loading in `tab_id`.
    ///
    /// Pages without an http(s) host are ignored and return `None`.
    pub async fn on_navigation_complete(&self, tab_id: TabId, url: &str) -> Option<NavigationOutcome> {
        let hostname = match hostname_of(url) {
            Ok(hostname) => hostname,
            Err(e) => {
                tracing::debug!(tab_id, url, error = %e, "ignoring navigation");
                return None;
            }
        };

        let engine = self.engine();

        if let Err(e) = engine.registry().record_visit(&hostname).await {
            tracing::warn!(hostname, error = %e, "failed to record source visit");
        }

        let cached = match engine.current_version().await {
            Ok(version) => engine.db().get_entry(&hostname, &version).await,
            Err(e) => Err(e),
        };
        let cached = cached.unwrap_or_else(|e| {
            tracing::warn!(hostname, error = %e, "cache read failed; treating as miss");
            None
        });

        if let Some(hit) = &cached {
            self.sink().present(Some(tab_id), &hit.entry.reviews);
        }

        let queued = cached.as_ref().is_none_or(|hit| hit.is_stale);
        if queued {
            self.enqueue(&hostname, false, Some(tab_id)).await;
        }

        Some(NavigationOutcome { hostname, cached, queued })
    }

    /// The user asked for fresh results for `hostname`.
    pub async fn on_explicit_refresh(&self, hostname: &str, tab_id: Option<TabId>) -> Result<String, Error> {
        let hostname = hostname_of(hostname).map_err(|e| match e {
            UrlError::Empty => Error::InvalidInput("hostname must not be empty".into()),
            other => Error::InvalidUrl(other.to_string()),
        })?;

        self.enqueue(&hostname, true, tab_id).await;
        Ok(hostname)
    }
}
