//! faro-sw entry point.
//!
//! Loads configuration, opens the bucket store, installs and activates the
//! configured worker version, then serves its events as MCP tools on stdio.
//! A failed first install is logged; the server still starts and polling
//! retries the install.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use faro_client::{FetchClient, FetchConfig, Network, Registration, WorkerSettings, spawn_update_polling};
use faro_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use url::Url;

mod handler;
mod tools;

/// Reload configuration and resolve it into settings for the next version.
fn load_settings() -> Result<WorkerSettings, faro_core::Error> {
    let config = AppConfig::load()?;
    WorkerSettings::from_config(&config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let settings = WorkerSettings::from_config(&config).context("resolving worker settings")?;
    let origin = Url::parse(&config.origin).context("parsing origin")?;

    tracing::info!(
        db = %config.db_path.display(),
        cache = %settings.cache_name,
        origin = %origin,
        "Starting faro-sw on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let registration = Arc::new(Registration::new(cache, network.clone()));
    if let Err(e) = registration.register(settings).await {
        tracing::error!(error = %e, "no worker active; requests pass through until an update installs");
    }

    let polling = config
        .update_interval()
        .map(|interval| spawn_update_polling(registration.clone(), interval, load_settings));

    let handler = handler::FaroServer::new(registration, network, origin);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    if let Some(handle) = polling {
        handle.abort();
    }

    Ok(())
}
