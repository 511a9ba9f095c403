//! MCP server handler implementation.
//!
//! This module defines the server handler that routes tool calls to the
//! registration. Each tool is one worker event or an inspection of its state.
use std::sync::Arc;

use crate::tools::{
    CacheGetParams, SwFetchParams, SwMessageParams, SwStatusParams, fetch_impl, get_impl, message_impl, status_impl,
};

use faro_client::{Network, Registration};
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
use url::Url;

/// The MCP server handler for faro-sw.
#[derive(Clone)]
pub struct FaroServer {
    registration: Arc<Registration>,
    network: Arc<dyn Network>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl FaroServer {
    /// Create a new server handler.
    pub fn new(registration: Arc<Registration>, network: Arc<dyn Network>, origin: Url) -> Self {
        Self { registration, network, origin, tool_router: Self::tool_router() }
    }

    /// Dispatch a fetch event.
    ///
    /// The active worker answers per its caching policy; unhandled requests
    /// go to the network directly.
    #[tool(
        description = "Dispatch a fetch event to the offline cache worker. Returns status, content type, the source (network, cache, offline_fallback, placeholder, synthetic) and the body."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, self.network.as_ref(), &self.origin, params.0).await
    }

    /// Post a page message to the worker.
    #[tool(
        description = "Post a message to the worker: {\"type\":\"SKIP_WAITING\"} activates a waiting version, {\"type\":\"CACHE_URLS\",\"urls\":[...]} caches URLs on demand."
    )]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    /// Report lifecycle states and the bucket inventory.
    #[tool(description = "Report the active and waiting worker versions and every cache bucket with its entry count.")]
    async fn sw_status(&self, _params: Parameters<SwStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    /// Look up a cached entry in the active bucket.
    #[tool(description = "Look up a cached response in the active worker's bucket by URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.registration, &self.origin, params.0).await
    }
}

impl ServerHandler for FaroServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "faro-sw".into(),
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
