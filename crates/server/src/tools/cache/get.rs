//! cache_get tool implementation.
//!
//! Reads the entry for a hostname under the current cache version, or lists
//! cached hostnames when none is given.

use repute_client::QueryEngine;
use repute_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Hostname the entry is keyed by. Omit to list cached hostnames.
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheListOutput {
    /// Newest first.
    pub hostnames: Vec<String>,
}

/// Implementation of the cache_get tool.
///
/// Entries from an older version count as misses; expired ones are deleted.
pub async fn get_impl(engine: &QueryEngine, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let Some(hostname) = params.hostname else {
        let hostnames = engine.db().list_hostnames().await?;
        return json_result(&CacheListOutput { hostnames });
    };

    let hostname = hostname.trim().to_lowercase();
    if hostname.is_empty() {
        return Err(Error::InvalidInput("hostname cannot be empty".into()).into());
    }

    let version = engine.current_version().await?;
    let cached = engine
        .db()
        .get_entry(&hostname, &version)
        .await?
        .ok_or_else(|| Error::CacheMiss(hostname.clone()))?;

    json_result(&cached)
}
