//! Messages that controlled pages post to the worker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A structured message tagged by its `type` field.
///
/// ```json
/// { "type": "SKIP_WAITING" }
/// { "type": "CACHE_URLS", "urls": ["/extra.json"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting worker now instead of waiting for old clients to close.
    SkipWaiting,
    /// Add these URLs to the current bucket.
    CacheUrls { urls: Vec<String> },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SkipWaiting => "SKIP_WAITING",
            ClientMessage::CacheUrls { .. } => "CACHE_URLS",
        }
    }
}
