//! Trusted source registry tools.
//!
//! Operator edits change the cache version, so entries built from the old
//! source list are refreshed on their next visit.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use repute_client::QueryEngine;
use repute_core::{SourceRecord, SourceState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

#[derive(Debug, Clone, Serialize)]
pub struct SourceListOutput {
    pub sources: Vec<SourceRecord>,
    /// Domains the next lookup will query, in priority order.
    pub active: Vec<String>,
}

pub async fn list_impl(engine: &QueryEngine) -> Result<CallToolResult, McpError> {
    let registry = engine.registry();
    let sources = registry.load().await?;
    let active = registry.active_domains(engine.settings().max_providers).await?;
    json_result(&SourceListOutput { sources, active })
}

/// Parameters for the source_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceAddParams {
    /// Review site domain, e.g. `trustpilot.com`.
    pub domain: String,
}

pub async fn add_impl(engine: &QueryEngine, params: SourceAddParams) -> Result<CallToolResult, McpError> {
    let record = engine.registry().add(&params.domain).await?;
    tracing::info!(domain = %record.domain, "source added");
    json_result(&record)
}

/// Parameters for the source_set_state tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceSetStateParams {
    pub domain: String,
    /// `on`, `auto` or `off`.
    pub state: SourceState,
}

pub async fn set_state_impl(engine: &QueryEngine, params: SourceSetStateParams) -> Result<CallToolResult, McpError> {
    let record = engine.registry().set_state(&params.domain, params.state).await?;
    tracing::info!(domain = %record.domain, state = ?record.state, "source state changed");
    json_result(&record)
}

/// Parameters for the source_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceRemoveParams {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRemoveOutput {
    pub removed: bool,
}

pub async fn remove_impl(engine: &QueryEngine, params: SourceRemoveParams) -> Result<CallToolResult, McpError> {
    let removed = engine.registry().remove(&params.domain).await?;
    json_result(&SourceRemoveOutput { removed })
}
