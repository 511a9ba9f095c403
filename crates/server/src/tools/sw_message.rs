//! sw_message tool implementation.
//!
//! Posts a page message (`SKIP_WAITING` or `CACHE_URLS`) to the registration.

use faro_client::Registration;
use faro_core::{ClientMessage, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// The message, e.g. `{"type": "SKIP_WAITING"}` or
    /// `{"type": "CACHE_URLS", "urls": ["/data/praias.json"]}`.
    pub message: ClientMessage,
}

/// Output structure for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Message type that was delivered.
    pub delivered: String,
    /// Bucket of the active worker after the message was handled.
    pub active: Option<String>,
}

pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let kind = params.message.kind();
    registration.post_message(params.message).await?;

    let active = registration.active().await.map(|w| w.cache_name().to_string());
    let output = SwMessageOutput { delivered: kind.to_string(), active };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
