//! cache_purge tool implementation.
//!
//! Purges cache entries by hostname, by expiry, or all at once.

use repute_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete the entry for this hostname.
    pub hostname: Option<String>,

    /// Delete entries past the expiry threshold.
    #[serde(default)]
    pub expired_only: bool,

    /// Delete every entry.
    #[serde(default)]
    pub all: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.hostname.is_none() && !params.expired_only && !params.all {
        return Err(Error::InvalidInput("At least one of hostname, expired_only, or all must be specified".to_string()).into());
    }

    let deleted = if params.all {
        cache.purge_entries().await?
    } else {
        let mut deleted = 0u64;
        if let Some(hostname) = params.hostname {
            deleted += u64::from(cache.delete_entry(&hostname.trim().to_lowercase()).await?);
        }
        if params.expired_only {
            deleted += cache.prune_expired().await?;
        }
        deleted
    };

    tracing::info!(deleted, "purged cache entries");
    json_result(&CachePurgeOutput { deleted })
}
