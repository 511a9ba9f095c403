//! Network-first strategies for navigations and unclassified requests.

use faro_core::{Error, Request, Response, ResponseSource};
use url::Url;

use super::StrategyContext;

const OFFLINE_HTML: &str = "<!DOCTYPE html><html lang=\"pt\"><head><meta charset=\"utf-8\">\
<title>Sem ligação</title></head><body><h1>Sem ligação</h1>\
<p>Esta página não está disponível offline.</p></body></html>";

/// Last-resort page for a navigation when even the offline page is missing
/// from the bucket.
pub fn offline_unavailable(url: &Url) -> Response {
    Response::synthetic(url, 503, Some("text/html; charset=utf-8"), OFFLINE_HTML)
}

/// Navigations: live page if reachable (written through to the bucket),
/// otherwise the cached page, otherwise the offline page.
pub(super) async fn with_offline_page(ctx: &StrategyContext, request: &Request) -> Result<Response, Error> {
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(request, &response).await;
            Ok(response)
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "navigation failed; trying cache");

            if let Some(cached) = ctx.lookup(request).await {
                return Ok(cached);
            }

            if let Some(offline) = ctx.lookup_url("GET", &ctx.offline_url).await {
                tracing::info!(url = %request.url, "serving offline page");
                return Ok(offline.with_source(ResponseSource::OfflineFallback));
            }

            tracing::warn!(offline_url = %ctx.offline_url, "offline page missing from cache");
            Ok(offline_unavailable(&request.url))
        }
    }
}

/// Everything else: live response if reachable, otherwise whatever the
/// bucket holds. With nothing cached the network error is returned as is.
pub(super) async fn with_cache_fallback(ctx: &StrategyContext, request: &Request) -> Result<Response, Error> {
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(request, &response).await;
            Ok(response)
        }
        Err(e) => match ctx.lookup(request).await {
            Some(cached) => Ok(cached),
            None => Err(e),
        },
    }
}
