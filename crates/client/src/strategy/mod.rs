//! Fetch strategies.
//!
//! [`ResourceClass::strategy`] is the dispatch table. Each [`Strategy`]
//! variant runs one function from `(request, context)` to a response:
//!
//! | Class         | Strategy                  | On total failure        |
//! |---------------|---------------------------|-------------------------|
//! | Navigation    | network first             | cached page, then offline page |
//! | StaticAsset   | cache first + revalidate  | error                   |
//! | MapTile       | cache first               | SVG placeholder tile    |
//! | ExternalCdn   | cache first               | empty 503               |
//! | ExternalApi   | network only              | error                   |
//! | Default       | network first             | cached copy, else error |

mod cache_first;
mod network_first;

use std::fmt;
use std::sync::Arc;

use faro_core::{CacheDb, CacheEntry, Error, Request, Response};
use url::Url;

use crate::classify::ResourceClass;
use crate::fetch::Network;

pub use cache_first::{PLACEHOLDER_TILE_SVG, placeholder_tile};
pub use network_first::offline_unavailable;

/// The caching policies a request can be served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network first; cached copy, then the offline page, on failure.
    NetworkFirstOfflinePage,
    /// Cached copy immediately, refreshed by a detached task.
    StaleWhileRevalidate,
    /// Cache first; placeholder tile when both cache and network fail.
    CacheFirstPlaceholder,
    /// Cache first; empty 503 when both cache and network fail.
    CacheFirstSilent,
    /// Straight to the network. The cache is never read or written.
    NetworkOnly,
    /// Network first; cached copy on failure.
    NetworkFirst,
}

impl ResourceClass {
    pub fn strategy(self) -> Strategy {
        match self {
            ResourceClass::Navigation => Strategy::NetworkFirstOfflinePage,
            ResourceClass::StaticAsset => Strategy::StaleWhileRevalidate,
            ResourceClass::MapTile => Strategy::CacheFirstPlaceholder,
            ResourceClass::ExternalCdn => Strategy::CacheFirstSilent,
            ResourceClass::ExternalApi => Strategy::NetworkOnly,
            ResourceClass::Default => Strategy::NetworkFirst,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::NetworkFirstOfflinePage => "network_first_offline_page",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
            Strategy::CacheFirstPlaceholder => "cache_first_placeholder",
            Strategy::CacheFirstSilent => "cache_first_silent",
            Strategy::NetworkOnly => "network_only",
            Strategy::NetworkFirst => "network_first",
        };
        f.write_str(s)
    }
}

impl Strategy {
    pub async fn run(self, ctx: &StrategyContext, request: Request) -> Result<Response, Error> {
        match self {
            Strategy::NetworkFirstOfflinePage => network_first::with_offline_page(ctx, &request).await,
            Strategy::StaleWhileRevalidate => cache_first::stale_while_revalidate(ctx, request).await,
            Strategy::CacheFirstPlaceholder => cache_first::with_placeholder(ctx, &request).await,
            Strategy::CacheFirstSilent => cache_first::silent(ctx, &request).await,
            Strategy::NetworkOnly => ctx.network.fetch(&request).await,
            Strategy::NetworkFirst => network_first::with_cache_fallback(ctx, &request).await,
        }
    }
}

/// Everything a strategy may touch: the worker's own bucket and the network.
#[derive(Clone)]
pub struct StrategyContext {
    pub cache: CacheDb,
    pub network: Arc<dyn Network>,
    /// Name of the bucket owned by this worker version. All writes go here.
    pub bucket: Arc<str>,
    pub offline_url: Url,
}

impl StrategyContext {
    /// Cached response for a request, if any.
    ///
    /// Storage errors are logged and treated as a miss.
    pub async fn lookup(&self, request: &Request) -> Option<Response> {
        self.lookup_url(&request.method, &request.url).await
    }

    pub async fn lookup_url(&self, method: &str, url: &Url) -> Option<Response> {
        match self.cache.match_entry(&self.bucket, method, url.as_str()).await {
            Ok(entry) => entry.map(CacheEntry::into_response),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Store a 2xx response to a GET request. Anything else is skipped.
    ///
    /// Storage errors are logged; the caller still returns the response. A
    /// write into an evicted bucket is dropped.
    pub async fn store(&self, request: &Request, response: &Response) {
        if !response.is_ok() {
            tracing::debug!(url = %request.url, status = response.status, "not caching non-2xx response");
            return;
        }
        if !request.method.eq_ignore_ascii_case("GET") {
            tracing::debug!(url = %request.url, method = %request.method, "not caching non-GET request");
            return;
        }

        let entry = CacheEntry::from_response(&self.bucket, &request.method, request.url.as_str(), response);
        match self.cache.put_entry(&entry).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(url = %request.url, bucket = %self.bucket, "bucket evicted; write skipped"),
            Err(e) => tracing::warn!(url = %request.url, bucket = %self.bucket, error = %e, "cache write failed"),
        }
    }
}
