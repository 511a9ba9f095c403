//! Cache-first strategies for static assets, map tiles and CDN resources.

use faro_core::{Error, Request, Response, ResponseSource};
use url::Url;

use super::StrategyContext;

/// Grey 256x256 tile shown in place of map tiles that are neither cached nor
/// reachable.
pub const PLACEHOLDER_TILE_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"256\" height=\"256\">\
<rect width=\"256\" height=\"256\" fill=\"#f0f0f0\"/>\
<text x=\"128\" y=\"128\" text-anchor=\"middle\" fill=\"#999\" font-size=\"14\">Offline</text></svg>";

pub fn placeholder_tile(url: &Url) -> Response {
    Response::synthetic(url, 200, Some("image/svg+xml"), PLACEHOLDER_TILE_SVG)
        .with_source(ResponseSource::Placeholder)
}

/// Cached copy when present, otherwise the network with write-through.
async fn cache_then_network(ctx: &StrategyContext, request: &Request) -> Result<Response, Error> {
    if let Some(cached) = ctx.lookup(request).await {
        return Ok(cached);
    }

    let response = ctx.network.fetch(request).await?;
    ctx.store(request, &response).await;
    Ok(response)
}

/// Static assets: answer from the bucket without waiting on the network and
/// refresh the entry in a detached task.
pub(super) async fn stale_while_revalidate(ctx: &StrategyContext, request: Request) -> Result<Response, Error> {
    if let Some(cached) = ctx.lookup(&request).await {
        spawn_revalidate(ctx.clone(), request);
        return Ok(cached);
    }

    let response = ctx.network.fetch(&request).await?;
    ctx.store(&request, &response).await;
    Ok(response)
}

fn spawn_revalidate(ctx: StrategyContext, request: Request) {
    tokio::spawn(async move {
        match ctx.network.fetch(&request).await {
            Ok(response) => {
                ctx.store(&request, &response).await;
                tracing::trace!(url = %request.url, status = response.status, "revalidated");
            }
            Err(e) => tracing::debug!(url = %request.url, error = %e, "background revalidation failed"),
        }
    });
}

/// Map tiles: placeholder image when both cache and network fail.
pub(super) async fn with_placeholder(ctx: &StrategyContext, request: &Request) -> Result<Response, Error> {
    match cache_then_network(ctx, request).await {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "tile unavailable; serving placeholder");
            Ok(placeholder_tile(&request.url))
        }
    }
}

/// Third-party CDN resources are optional, so failure becomes an empty 503.
pub(super) async fn silent(ctx: &StrategyContext, request: &Request) -> Result<Response, Error> {
    match cache_then_network(ctx, request).await {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "CDN resource unavailable");
            Ok(Response::synthetic(&request.url, 503, None, ""))
        }
    }
}
