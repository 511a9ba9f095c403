//! Request and response types shared by the cache, the network layer and the
//! fetch strategies.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request, mirroring the Fetch API `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: String,
    pub mode: RequestMode,
    /// Value of the Accept header, if the page sent one.
    pub accept: Option<String>,
}

impl Request {
    /// A plain `GET` subresource request.
    pub fn get(url: Url) -> Self {
        Self { url, method: "GET".into(), mode: RequestMode::default(), accept: None }
    }

    /// A top-level navigation.
    pub fn navigate(url: Url) -> Self {
        Self { url, method: "GET".into(), mode: RequestMode::Navigate, accept: Some("text/html".into()) }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// True for navigations and for requests that declare an HTML accept type.
    pub fn wants_html(&self) -> bool {
        self.mode == RequestMode::Navigate || self.accept.as_deref().is_some_and(|a| a.contains("text/html"))
    }
}

/// Which branch of a strategy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
    Placeholder,
    Synthetic,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::OfflineFallback => "offline_fallback",
            ResponseSource::Placeholder => "placeholder",
            ResponseSource::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

/// A response handed back to the page.
///
/// The body is `Bytes`, so cloning a response to both store and return it is
/// a reference-count bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl Response {
    /// Build a response that did not come from the network or the cache.
    pub fn synthetic(url: &Url, status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.to_string(),
            status,
            content_type: content_type.map(str::to_string),
            headers: Vec::new(),
            body: body.into(),
            source: ResponseSource::Synthetic,
        }
    }

    /// 2xx status, the same test the Fetch API uses for `response.ok`.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
