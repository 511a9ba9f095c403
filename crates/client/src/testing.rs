//! Scripted network double and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use faro_core::{AppConfig, CacheDb, Error, Request, Response, ResponseSource};
use url::Url;

use crate::fetch::Network;
use crate::strategy::StrategyContext;

pub(crate) const ORIGIN: &str = "https://faro.test";
pub(crate) const BUCKET: &str = "faro-formoso-v1";

#[derive(Clone)]
struct Route {
    status: u16,
    content_type: String,
    body: Bytes,
    delay: Option<Duration>,
}

/// In-memory network. Unknown URLs answer 404; `set_online(false)` makes
/// every fetch fail like a dropped connection.
pub(crate) struct ScriptedNetwork {
    online: AtomicBool,
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn serve(&self, url: &str, status: u16, content_type: &str, body: &str) {
        self.routes.lock().unwrap().insert(
            absolute(url).to_string(),
            Route {
                status,
                content_type: content_type.to_string(),
                body: Bytes::copy_from_slice(body.as_bytes()),
                delay: None,
            },
        );
    }

    pub(crate) fn serve_slow(&self, url: &str, body: &str, delay: Duration) {
        self.serve(url, 200, "text/plain", body);
        if let Some(route) = self.routes.lock().unwrap().get_mut(absolute(url).as_str()) {
            route.delay = Some(delay);
        }
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// How many times `url` was fetched, including failed attempts.
    pub(crate) fn calls(&self, url: &str) -> usize {
        let url = absolute(url).to_string();
        self.calls.lock().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let route = route.unwrap_or(Route {
            status: 404,
            content_type: "text/plain".into(),
            body: Bytes::from_static(b"not found"),
            delay: None,
        });

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(Response {
            url: request.url.to_string(),
            status: route.status,
            content_type: Some(route.content_type),
            headers: Vec::new(),
            body: route.body,
            source: ResponseSource::Network,
        })
    }
}

/// Resolve a test path against [`ORIGIN`]; absolute URLs pass through.
pub(crate) fn absolute(url: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(url).unwrap()
}

pub(crate) fn test_config(precache: &[&str]) -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        precache: precache.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub(crate) async fn test_context(network: Arc<ScriptedNetwork>) -> StrategyContext {
    let cache = CacheDb::open_in_memory().await.unwrap();
    cache.open_bucket(BUCKET).await.unwrap();
    StrategyContext {
        cache,
        network,
        bucket: BUCKET.into(),
        offline_url: absolute("/offline.html"),
    }
}

/// Poll until `check` passes; background tasks get scheduled in between.
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
