//! MCP server handler implementation.
//!
//! Routes tool calls to the scheduler, the source registry, the cache and the
//! tab board.
use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::sink::TabBoard;
use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::site::{
    QueueStatusParams, SiteRefreshParams, SiteVisitParams, TabResultParams, refresh_impl, status_impl, tab_result_impl,
    visit_impl,
};
use crate::tools::sources::{
    SourceAddParams, SourceRemoveParams, SourceSetStateParams, add_impl, list_impl, remove_impl, set_state_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for repute.
#[derive(Clone)]
pub struct ReputeServer {
    tool_router: ToolRouter<Self>,
    scheduler: Scheduler,
    board: Arc<TabBoard>,
}

#[tool_router]
impl ReputeServer {
    /// `board` must be the sink the scheduler delivers to.
    pub fn new(scheduler: Scheduler, board: Arc<TabBoard>) -> Self {
        Self { tool_router: Self::tool_router(), scheduler, board }
    }

    #[tool(
        description = "Report that a page finished loading in a tab. Presents cached reviews immediately and queues a lookup when they are missing or stale."
    )]
    async fn site_visit(&self, params: Parameters<SiteVisitParams>) -> Result<CallToolResult, McpError> {
        visit_impl(&self.scheduler, params.0).await
    }

    #[tool(description = "Queue a forced lookup for a hostname, bypassing the cache.")]
    async fn site_refresh(&self, params: Parameters<SiteRefreshParams>) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.scheduler, params.0).await
    }

    #[tool(description = "Show the lookup queue, the active task, the last error, and optionally the cached result for a hostname.")]
    async fn queue_status(&self, params: Parameters<QueueStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.scheduler, params.0).await
    }

    #[tool(description = "Get the reviews last delivered to a tab.")]
    async fn tab_result(&self, params: Parameters<TabResultParams>) -> Result<CallToolResult, McpError> {
        tab_result_impl(&self.board, params.0)
    }

    #[tool(description = "List trusted review sources with their state and visit counts.")]
    async fn source_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(self.scheduler.engine()).await
    }

    #[tool(description = "Add a trusted review source, or switch an existing one on.")]
    async fn source_add(&self, params: Parameters<SourceAddParams>) -> Result<CallToolResult, McpError> {
        add_impl(self.scheduler.engine(), params.0).await
    }

    #[tool(description = "Set a review source to on, auto, or off.")]
    async fn source_set_state(&self, params: Parameters<SourceSetStateParams>) -> Result<CallToolResult, McpError> {
        set_state_impl(self.scheduler.engine(), params.0).await
    }

    #[tool(description = "Remove a review source.")]
    async fn source_remove(&self, params: Parameters<SourceRemoveParams>) -> Result<CallToolResult, McpError> {
        remove_impl(self.scheduler.engine(), params.0).await
    }

    #[tool(description = "Get the cached reputation entry for a hostname, or list cached hostnames when none is given. Entries from an older configuration count as misses.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.scheduler.engine(), params.0).await
    }

    #[tool(description = "Delete cached entries by hostname, expired entries, or everything.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.scheduler.engine().db(), params.0).await
    }
}

impl ServerHandler for ReputeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "repute".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
