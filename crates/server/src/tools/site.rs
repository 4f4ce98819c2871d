//! Browser-facing tools: navigation, refresh, queue status and tab results.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use repute_core::{Review, TabId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::events::NavigationOutcome;
use crate::scheduler::Scheduler;
use crate::sink::TabBoard;

/// Parameters for the site_visit tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteVisitParams {
    /// Tab the page was loaded in.
    pub tab_id: TabId,
    /// URL of the loaded page.
    pub url: String,
}

/// Output from the site_visit tool.
#[derive(Debug, Clone, Serialize)]
pub struct SiteVisitOutput {
    /// The URL had no http(s) host and was not processed.
    pub ignored: bool,
    #[serde(flatten)]
    pub outcome: Option<NavigationOutcome>,
}

pub async fn visit_impl(scheduler: &Scheduler, params: SiteVisitParams) -> Result<CallToolResult, McpError> {
    let outcome = scheduler.on_navigation_complete(params.tab_id, &params.url).await;
    json_result(&SiteVisitOutput { ignored: outcome.is_none(), outcome })
}

/// Parameters for the site_refresh tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteRefreshParams {
    /// Hostname (or URL) to look up again.
    pub hostname: String,
    /// Tab to deliver the fresh result to.
    pub tab_id: Option<TabId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteRefreshOutput {
    pub hostname: String,
    pub queued: bool,
}

pub async fn refresh_impl(scheduler: &Scheduler, params: SiteRefreshParams) -> Result<CallToolResult, McpError> {
    let hostname = scheduler.on_explicit_refresh(&params.hostname, params.tab_id).await?;
    json_result(&SiteRefreshOutput { hostname, queued: true })
}

/// Parameters for the queue_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueueStatusParams {
    /// Also return the cached result for this hostname.
    pub hostname: Option<String>,
}

pub async fn status_impl(scheduler: &Scheduler, params: QueueStatusParams) -> Result<CallToolResult, McpError> {
    let hostname = params.hostname.map(|h| h.trim().to_lowercase()).filter(|h| !h.is_empty());
    let snapshot = scheduler.status(hostname.as_deref()).await?;
    json_result(&snapshot)
}

/// Parameters for the tab_result tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TabResultParams {
    pub tab_id: TabId,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabResultOutput {
    pub tab_id: TabId,
    /// Reviews last delivered to the tab; `None` until something arrives.
    pub reviews: Option<Vec<Review>>,
}

pub fn tab_result_impl(board: &TabBoard, params: TabResultParams) -> Result<CallToolResult, McpError> {
    json_result(&TabResultOutput { tab_id: params.tab_id, reviews: board.get(params.tab_id) })
}
