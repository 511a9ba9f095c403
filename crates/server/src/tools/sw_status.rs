//! sw_status tool implementation.

use faro_client::{Registration, WorkerInfo};
use faro_core::Error;
use faro_core::cache::buckets::BucketInfo;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the sw_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerView {
    pub cache_name: String,
    /// Lifecycle state, e.g. "active" or "waiting".
    pub state: String,
    pub skip_waiting: bool,
}

impl From<WorkerInfo> for WorkerView {
    fn from(info: WorkerInfo) -> Self {
        Self { cache_name: info.cache_name, state: info.state.to_string(), skip_waiting: info.skip_waiting }
    }
}

/// Output structure for the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub active: Option<WorkerView>,
    pub waiting: Option<WorkerView>,
    /// Every bucket in storage with its entry count.
    pub buckets: Vec<BucketInfo>,
}

pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let status = registration.status().await?;
    let output = SwStatusOutput {
        active: status.active.map(WorkerView::from),
        waiting: status.waiting.map(WorkerView::from),
        buckets: status.buckets,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize status: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
