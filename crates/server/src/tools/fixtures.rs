//! Test fixtures: a registration over an in-memory cache and a canned network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use faro_client::{Network, Registration, WorkerSettings};
use faro_core::{AppConfig, CacheDb, Error, Request, Response, ResponseSource};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use url::Url;

pub const ORIGIN: &str = "https://faro.test";

/// Serves fixed bodies by URL; everything else is a 404.
#[derive(Default)]
pub struct CannedNetwork {
    routes: HashMap<String, (&'static str, &'static str)>,
    offline: AtomicBool,
}

impl CannedNetwork {
    pub fn with(mut self, path: &str, content_type: &'static str, body: &'static str) -> Self {
        self.routes.insert(origin().join(path).unwrap().to_string(), (content_type, body));
        self
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for CannedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let (status, content_type, body) = match self.routes.get(request.url.as_str()) {
            Some((ct, body)) => (200, *ct, *body),
            None => (404, "text/plain", "not found"),
        };
        Ok(Response {
            url: request.url.to_string(),
            status,
            content_type: Some(content_type.to_string()),
            headers: Vec::new(),
            body: Bytes::from_static(body.as_bytes()),
            source: ResponseSource::Network,
        })
    }
}

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn settings(version: &str, skip_waiting: bool) -> WorkerSettings {
    let config = AppConfig {
        origin: ORIGIN.into(),
        precache: vec!["/".into(), "/offline.html".into()],
        cache_version: version.into(),
        skip_waiting_on_install: skip_waiting,
        ..Default::default()
    };
    WorkerSettings::from_config(&config).unwrap()
}

pub fn shell() -> CannedNetwork {
    CannedNetwork::default()
        .with("/", "text/html", "<h1>Faro Formoso</h1>")
        .with("/offline.html", "text/html", "<h1>Sem ligação</h1>")
        .with("/data/praias.json", "application/json", "[\"Barra\",\"Costa Nova\"]")
}

/// A registration with `v1` active over `network`.
pub async fn registered(network: Arc<CannedNetwork>) -> Arc<Registration> {
    let registration = Registration::new(CacheDb::open_in_memory().await.unwrap(), network);
    registration.register(settings("v1", true)).await.unwrap();
    Arc::new(registration)
}

/// Decode the JSON text payload of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
