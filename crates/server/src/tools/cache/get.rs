//! cache_get tool implementation.
//!
//! Looks up an entry in the active worker's bucket by URL.

use faro_client::Registration;
use faro_client::fetch::canonicalize_http;
use faro_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL of the cached entry. Relative URLs resolve against the origin.
    pub url: String,

    /// Request method the entry was stored under (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub hash: String,
    pub bucket: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub stored_at: String,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(registration: &Registration, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize_http(origin, &params.url).map_err(Error::from)?;
    let active = registration
        .active()
        .await
        .ok_or_else(|| Error::InvalidState { expected: "active worker".into(), actual: "none".into() })?;

    let entry = registration
        .cache()
        .match_entry(active.cache_name(), &params.method, url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    let output = CacheGetOutput {
        body: String::from_utf8_lossy(&entry.body).into_owned(),
        body_bytes: entry.body.len(),
        hash: entry.hash,
        bucket: entry.bucket,
        url: entry.url,
        method: entry.method,
        status_code: entry.status_code,
        content_type: entry.content_type,
        stored_at: entry.stored_at,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{origin, output, registered, shell};
    use std::sync::Arc;

    fn params(url: &str) -> CacheGetParams {
        CacheGetParams { url: url.to_string(), method: default_method() }
    }

    #[tokio::test]
    async fn test_get_impl_missing() {
        let registration = registered(Arc::new(shell())).await;

        let err = get_impl(&registration, &origin(), params("/nao-existe.html")).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let registration = registered(Arc::new(shell())).await;

        let result = get_impl(&registration, &origin(), params("/offline.html")).await.unwrap();
        let out: CacheGetOutput = output(&result);
        assert_eq!(out.bucket, "faro-formoso-v1");
        assert_eq!(out.url, "https://faro.test/offline.html");
        assert_eq!(out.status_code, 200);
        assert_eq!(out.body, "<h1>Sem ligação</h1>");
    }

    #[tokio::test]
    async fn test_get_impl_without_active_worker() {
        let registration = faro_client::Registration::new(
            faro_core::CacheDb::open_in_memory().await.unwrap(),
            Arc::new(shell()),
        );

        let err = get_impl(&registration, &origin(), params("/")).await.unwrap_err();
        assert_eq!(err.code.0, -32014);
    }
}
