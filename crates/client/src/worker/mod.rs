//! The offline cache manager: one worker version and its lifecycle hooks.
//!
//! ### Lifecycle
//! `Parsed -> Installing -> Waiting -> Activating -> Active`, with
//! `Redundant` as the terminal state for failed installs and replaced
//! versions. State changes are published on a `watch` channel.
//!
//! ### Install
//! The whole manifest is fetched concurrently. Every entry must answer 2xx
//! before anything is written; the entries then land in one transaction.
//!
//! ### Activate
//! Every bucket other than this version's is deleted.

mod settings;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use faro_core::{CacheDb, CacheEntry, ClientMessage, Error, Request, Response};
use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::watch;
use url::Url;

pub use settings::WorkerSettings;

use crate::fetch::Network;
use crate::strategy::StrategyContext;

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed, not yet controlling clients.
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Hooks the hosting runtime dispatches events to.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Populate this version's bucket from the precache manifest.
    async fn on_install(&self) -> Result<(), Error>;

    /// Evict every other bucket and start controlling clients.
    async fn on_activate(&self) -> Result<(), Error>;

    /// Handle an intercepted request. `Ok(None)` means "not handled": the
    /// request goes to the network untouched.
    async fn on_fetch(&self, request: Request) -> Result<Option<Response>, Error>;

    /// Handle a message posted by a controlled page.
    async fn on_message(&self, message: ClientMessage) -> Result<(), Error>;
}

/// One worker version.
pub struct OfflineCacheManager {
    settings: WorkerSettings,
    ctx: StrategyContext,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
}

impl OfflineCacheManager {
    pub fn new(settings: WorkerSettings, cache: CacheDb, network: Arc<dyn Network>) -> Self {
        let ctx = StrategyContext {
            cache,
            network,
            bucket: settings.cache_name.as_str().into(),
            offline_url: settings.offline_url.clone(),
        };
        let (state, _) = watch::channel(WorkerState::Parsed);

        Self { settings, ctx, state, skip_waiting: AtomicBool::new(false) }
    }

    pub fn cache_name(&self) -> &str {
        &self.settings.cache_name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// True once this version asked to bypass the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(cache = %self.settings.cache_name, from = %prev, to = %next, "worker state change");
        }
    }

    pub(crate) fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Take over the bucket a previous run of this same version left in
    /// storage, skipping the precache. Moves to Waiting and returns true when
    /// the bucket holds entries; otherwise stays Parsed and returns false.
    pub(crate) async fn resume(&self) -> Result<bool, Error> {
        self.expect_state(WorkerState::Parsed)?;

        let entries = self.ctx.cache.entry_count(self.cache_name()).await?;
        if entries == 0 {
            return Ok(false);
        }

        self.set_state(WorkerState::Waiting);
        tracing::info!(cache = %self.settings.cache_name, entries, "resuming from persisted bucket");
        Ok(true)
    }

    fn expect_state(&self, expected: WorkerState) -> Result<(), Error> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { expected: expected.to_string(), actual: actual.to_string() })
        }
    }

    /// Fetch every URL, then store all of them at once.
    ///
    /// Nothing is written unless every URL answered 2xx.
    async fn add_all(&self, urls: &[Url]) -> Result<usize, Error> {
        let bucket = self.cache_name();
        let fetches = urls.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .ctx
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;

            if !response.is_ok() {
                return Err(Error::PrecacheFailed { url: url.to_string(), reason: format!("status {}", response.status) });
            }

            Ok::<_, Error>(CacheEntry::from_response(bucket, "GET", url.as_str(), &response))
        });

        let entries = try_join_all(fetches).await?;
        let count = entries.len();

        self.ctx.cache.open_bucket(bucket).await?;
        self.ctx.cache.put_entries(entries).await?;

        Ok(count)
    }
}

#[async_trait]
impl LifecycleHooks for OfflineCacheManager {
    async fn on_install(&self) -> Result<(), Error> {
        self.expect_state(WorkerState::Parsed)?;
        self.set_state(WorkerState::Installing);

        tracing::info!(
            cache = %self.settings.cache_name,
            entries = self.settings.manifest.len(),
            "installing; precaching manifest"
        );

        match self.add_all(&self.settings.manifest).await {
            Ok(count) => {
                if self.settings.skip_waiting_on_install {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                self.set_state(WorkerState::Waiting);
                tracing::info!(cache = %self.settings.cache_name, entries = count, "precache complete");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                tracing::error!(cache = %self.settings.cache_name, error = %e, "precache failed; install aborted");
                Err(e)
            }
        }
    }

    async fn on_activate(&self) -> Result<(), Error> {
        self.expect_state(WorkerState::Waiting)?;
        self.set_state(WorkerState::Activating);

        let evicted = self.ctx.cache.delete_buckets_except(&self.settings.cache_name).await?;
        for name in &evicted {
            tracing::info!(bucket = %name, "removed stale bucket");
        }

        self.set_state(WorkerState::Active);
        tracing::info!(cache = %self.settings.cache_name, "activated; claiming clients");
        Ok(())
    }

    async fn on_fetch(&self, mut request: Request) -> Result<Option<Response>, Error> {
        if !request.is_http() {
            tracing::trace!(url = %request.url, "ignoring non-http request");
            return Ok(None);
        }
        if self.state() != WorkerState::Active {
            tracing::trace!(url = %request.url, state = %self.state(), "worker not active; not handling");
            return Ok(None);
        }

        request.url.set_fragment(None);

        let class = self.settings.rules.classify(&request);
        let strategy = class.strategy();
        tracing::debug!(url = %request.url, class = %class, strategy = %strategy, "fetch");

        strategy.run(&self.ctx, request).await.map(Some)
    }

    async fn on_message(&self, message: ClientMessage) -> Result<(), Error> {
        tracing::debug!(cache = %self.settings.cache_name, kind = message.kind(), "message received");

        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(())
            }
            ClientMessage::CacheUrls { urls } => {
                if self.state() == WorkerState::Redundant {
                    return Err(Error::InvalidState {
                        expected: "installed worker".into(),
                        actual: WorkerState::Redundant.to_string(),
                    });
                }
                let urls = self.settings.resolve_urls(&urls)?;
                let count = self.add_all(&urls).await?;
                tracing::info!(cache = %self.settings.cache_name, entries = count, "cached URLs on demand");
                Ok(())
            }
        }
    }
}
