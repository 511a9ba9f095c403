//! sw_fetch tool implementation.
//!
//! Dispatches a fetch event through the registration. Requests the active
//! worker does not handle go straight to the network, as the platform would.

use faro_client::Registration;
use faro_client::fetch::{Network, canonicalize};
use faro_core::{Error, Request, RequestMode, ResponseSource};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to request. Relative URLs resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: RequestMode,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Which branch produced the response.
    pub source: ResponseSource,
    /// False when the worker passed the request through.
    pub handled: bool,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

pub async fn fetch_impl(
    registration: &Registration, network: &dyn Network, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = canonicalize(origin, &params.url).map_err(Error::from)?;
    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = Request::get(url).with_mode(params.mode);
    request.method = method;
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let (response, handled) = match registration.fetch(request.clone()).await? {
        Some(response) => (response, true),
        None => {
            tracing::debug!(url = %request.url, "not handled by worker; passing through");
            (network.fetch(&request).await?, false)
        }
    };

    let output = SwFetchOutput {
        url: response.url.clone(),
        status: response.status,
        content_type: response.content_type.clone(),
        source: response.source,
        handled,
        body: response.text().into_owned(),
        body_bytes: response.body.len(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize response: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
