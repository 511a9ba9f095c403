//! Worker registration: holds the active and waiting versions and routes
//! events to them.
//!
//! Lifecycle operations (`register`, `update`, `post_message`) are
//! serialized by a mutex. Fetches only take a read lock long enough to clone
//! the active worker, so requests keep flowing while a new version installs.

use std::sync::Arc;
use std::time::Duration;

use faro_core::cache::buckets::BucketInfo;
use faro_core::{CacheDb, ClientMessage, Error, Request, Response};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::fetch::Network;
use crate::worker::{LifecycleHooks, OfflineCacheManager, WorkerSettings, WorkerState};

#[derive(Default)]
struct Workers {
    active: Option<Arc<OfflineCacheManager>>,
    waiting: Option<Arc<OfflineCacheManager>>,
}

/// Snapshot of one worker version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub cache_name: String,
    pub state: WorkerState,
    pub skip_waiting: bool,
}

impl WorkerInfo {
    fn of(worker: &OfflineCacheManager) -> Self {
        Self {
            cache_name: worker.cache_name().to_string(),
            state: worker.state(),
            skip_waiting: worker.skip_waiting_requested(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub buckets: Vec<BucketInfo>,
}

pub struct Registration {
    cache: CacheDb,
    network: Arc<dyn Network>,
    workers: RwLock<Workers>,
    lifecycle: Mutex<()>,
}

impl Registration {
    pub fn new(cache: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { cache, network, workers: RwLock::new(Workers::default()), lifecycle: Mutex::new(()) }
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    /// Install the first version and activate it.
    ///
    /// When the install fails but an earlier run of the same version left its
    /// bucket in storage, that bucket is taken over instead, so a restart
    /// while offline keeps serving from cache.
    ///
    /// # Errors
    ///
    /// Returns an error if a version is already registered, if install fails
    /// with nothing persisted to fall back on, or if activation fails.
    pub async fn register(&self, settings: WorkerSettings) -> Result<(), Error> {
        let _guard = self.lifecycle.lock().await;

        {
            let workers = self.workers.read().await;
            if let Some(active) = &workers.active {
                return Err(Error::InvalidState {
                    expected: "no registered worker".into(),
                    actual: format!("{} is active", active.cache_name()),
                });
            }
        }

        let worker = match self.install(settings.clone()).await {
            Ok(worker) => worker,
            Err(e) => {
                let worker = Arc::new(OfflineCacheManager::new(settings, self.cache.clone(), self.network.clone()));
                if !worker.resume().await? {
                    return Err(e);
                }
                tracing::warn!(cache = %worker.cache_name(), error = %e, "install failed; serving persisted bucket");
                worker
            }
        };
        self.promote(worker).await
    }

    /// Install a new version if its bucket name differs from the current
    /// one. Returns `false` when nothing changed.
    ///
    /// The new version activates at once when it asked to skip waiting or
    /// when nothing is active; otherwise it waits for `SKIP_WAITING`. A failed
    /// install leaves the current version in control.
    pub async fn update(&self, settings: WorkerSettings) -> Result<bool, Error> {
        let _guard = self.lifecycle.lock().await;

        let (has_active, unchanged) = {
            let workers = self.workers.read().await;
            let unchanged = [&workers.active, &workers.waiting]
                .into_iter()
                .flatten()
                .any(|w| w.cache_name() == settings.cache_name);
            (workers.active.is_some(), unchanged)
        };
        if unchanged {
            tracing::debug!(cache = %settings.cache_name, "no new version");
            return Ok(false);
        }

        tracing::info!(cache = %settings.cache_name, "new version found");
        let worker = self.install(settings).await?;

        if !has_active || worker.skip_waiting_requested() {
            self.promote(worker).await?;
        } else {
            let mut workers = self.workers.write().await;
            if let Some(previous) = workers.waiting.replace(worker) {
                previous.mark_redundant();
            }
        }

        Ok(true)
    }

    async fn install(&self, settings: WorkerSettings) -> Result<Arc<OfflineCacheManager>, Error> {
        let worker = Arc::new(OfflineCacheManager::new(settings, self.cache.clone(), self.network.clone()));
        worker.on_install().await?;
        Ok(worker)
    }

    /// Activate `worker` and make it the one fetches are routed to.
    async fn promote(&self, worker: Arc<OfflineCacheManager>) -> Result<(), Error> {
        if let Err(e) = worker.on_activate().await {
            worker.mark_redundant();
            tracing::error!(cache = %worker.cache_name(), error = %e, "activation failed");
            return Err(e);
        }

        let mut workers = self.workers.write().await;
        if let Some(waiting) = workers.waiting.take().filter(|w| !Arc::ptr_eq(w, &worker)) {
            waiting.mark_redundant();
        }
        if let Some(previous) = workers.active.replace(worker) {
            previous.mark_redundant();
        }
        Ok(())
    }

    /// Route a fetch to the active worker. `Ok(None)` means pass through.
    pub async fn fetch(&self, request: Request) -> Result<Option<Response>, Error> {
        let active = self.workers.read().await.active.clone();
        match active {
            Some(worker) => worker.on_fetch(request).await,
            None => Ok(None),
        }
    }

    /// Route a page message.
    ///
    /// `SKIP_WAITING` goes to the waiting worker, which is then promoted. With
    /// nothing waiting it is a no-op. `CACHE_URLS` goes to the active worker.
    pub async fn post_message(&self, message: ClientMessage) -> Result<(), Error> {
        let _guard = self.lifecycle.lock().await;

        match message {
            ClientMessage::SkipWaiting => {
                let waiting = self.workers.read().await.waiting.clone();
                let Some(worker) = waiting else {
                    tracing::debug!("SKIP_WAITING with no waiting worker");
                    return Ok(());
                };
                worker.on_message(ClientMessage::SkipWaiting).await?;
                self.promote(worker).await
            }
            message @ ClientMessage::CacheUrls { .. } => {
                let active = self.workers.read().await.active.clone();
                match active {
                    Some(worker) => worker.on_message(message).await,
                    None => Err(Error::InvalidState { expected: "active worker".into(), actual: "none".into() }),
                }
            }
        }
    }

    pub async fn active(&self) -> Option<Arc<OfflineCacheManager>> {
        self.workers.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<OfflineCacheManager>> {
        self.workers.read().await.waiting.clone()
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        let (active, waiting) = {
            let workers = self.workers.read().await;
            (
                workers.active.as_deref().map(WorkerInfo::of),
                workers.waiting.as_deref().map(WorkerInfo::of),
            )
        };
        let buckets = self.cache.bucket_inventory().await?;
        Ok(RegistrationStatus { active, waiting, buckets })
    }
}

/// Reload settings and hand them to [`Registration::update`].
///
/// Errors are logged and swallowed so the polling loop keeps running.
pub async fn poll_update<F>(registration: &Registration, load: &F)
where
    F: Fn() -> Result<WorkerSettings, Error>,
{
    let settings = match load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "update check: could not load settings");
            return;
        }
    };

    match registration.update(settings).await {
        Ok(true) => tracing::info!("update check: new version installed"),
        Ok(false) => tracing::debug!("update check: up to date"),
        Err(e) => tracing::warn!(error = %e, "update check: install failed; keeping current version"),
    }
}

/// Check for a new version every `interval`. The first check runs one full
/// interval after spawning.
pub fn spawn_update_polling<F>(registration: Arc<Registration>, interval: Duration, load: F) -> JoinHandle<()>
where
    F: Fn() -> Result<WorkerSettings, Error> + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            poll_update(&registration, &load).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, absolute, test_config};
    use faro_core::ResponseSource;

    fn serve_shell(network: &ScriptedNetwork) {
        network.serve("/", 200, "text/html", "<h1>v1</h1>");
        network.serve("/offline.html", 200, "text/html", "<h1>Offline</h1>");
    }

    fn settings(version: &str, skip_waiting: bool) -> WorkerSettings {
        let mut config = test_config(&["/"]);
        config.cache_version = version.into();
        config.skip_waiting_on_install = skip_waiting;
        WorkerSettings::from_config(&config).unwrap()
    }

    async fn registered(network: Arc<ScriptedNetwork>) -> Registration {
        serve_shell(&network);
        let registration = Registration::new(CacheDb::open_in_memory().await.unwrap(), network);
        registration.register(settings("v1", true)).await.unwrap();
        registration
    }

    #[tokio::test]
    async fn test_register_activates_first_version() {
        let registration = registered(ScriptedNetwork::new()).await;

        let status = registration.status().await.unwrap();
        let active = status.active.unwrap();
        assert_eq!(active.cache_name, "faro-formoso-v1");
        assert_eq!(active.state, WorkerState::Active);
        assert!(status.waiting.is_none());
        assert_eq!(status.buckets, vec![BucketInfo { name: "faro-formoso-v1".into(), entries: 2 }]);
    }

    #[tokio::test]
    async fn test_restart_offline_serves_persisted_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("faro-sw-cache.sqlite");

        let network = ScriptedNetwork::new();
        serve_shell(&network);
        let first = Registration::new(CacheDb::open(&db_path).await.unwrap(), network.clone());
        first.register(settings("v1", true)).await.unwrap();
        drop(first);

        network.set_online(false);
        let restarted = Registration::new(CacheDb::open(&db_path).await.unwrap(), network);
        restarted.register(settings("v1", true)).await.unwrap();

        let active = restarted.active().await.unwrap();
        assert_eq!(active.cache_name(), "faro-formoso-v1");
        assert_eq!(active.state(), WorkerState::Active);

        let response = restarted.fetch(Request::navigate(absolute("/"))).await.unwrap().unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.text(), "<h1>v1</h1>");

        let response = restarted.fetch(Request::navigate(absolute("/saude.html"))).await.unwrap().unwrap();
        assert_eq!(response.source, ResponseSource::OfflineFallback);
    }

    #[tokio::test]
    async fn test_restart_offline_with_other_version_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("faro-sw-cache.sqlite");

        let network = ScriptedNetwork::new();
        serve_shell(&network);
        let first = Registration::new(CacheDb::open(&db_path).await.unwrap(), network.clone());
        first.register(settings("v1", true)).await.unwrap();
        drop(first);

        network.set_online(false);
        let restarted = Registration::new(CacheDb::open(&db_path).await.unwrap(), network);
        let result = restarted.register(settings("v2", true)).await;
        assert!(matches!(result, Err(Error::PrecacheFailed { .. })));
        assert!(restarted.active().await.is_none());
        assert!(restarted.cache().has_bucket("faro-formoso-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_twice_is_invalid() {
        let registration = registered(ScriptedNetwork::new()).await;
        let result = registration.register(settings("v2", true)).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_register_failure_leaves_nothing_active() {
        let network = ScriptedNetwork::new();
        let registration = Registration::new(CacheDb::open_in_memory().await.unwrap(), network);

        assert!(registration.register(settings("v1", true)).await.is_err());
        assert!(registration.active().await.is_none());
        let passthrough = registration.fetch(Request::navigate(absolute("/"))).await.unwrap();
        assert!(passthrough.is_none());
    }

    #[tokio::test]
    async fn test_update_same_version_is_noop() {
        let network = ScriptedNetwork::new();
        let registration = registered(network.clone()).await;
        let before = network.calls("/");

        assert!(!registration.update(settings("v1", true)).await.unwrap());
        assert_eq!(network.calls("/"), before);
    }

    #[tokio::test]
    async fn test_update_with_skip_waiting_replaces_active() {
        let network = ScriptedNetwork::new();
        let registration = registered(network.clone()).await;
        let old = registration.active().await.unwrap();

        network.serve("/", 200, "text/html", "<h1>v2</h1>");
        assert!(registration.update(settings("v2", true)).await.unwrap());

        let active = registration.active().await.unwrap();
        assert_eq!(active.cache_name(), "faro-formoso-v2");
        assert_eq!(old.state(), WorkerState::Redundant);
        let names = registration.cache().bucket_names().await.unwrap();
        assert_eq!(names, vec!["faro-formoso-v2".to_string()]);

        network.set_online(false);
        let response = registration.fetch(Request::navigate(absolute("/"))).await.unwrap().unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.text(), "<h1>v2</h1>");
    }

    #[tokio::test]
    async fn test_update_waits_for_skip_waiting_message() {
        let network = ScriptedNetwork::new();
        let registration = registered(network.clone()).await;

        assert!(registration.update(settings("v2", false)).await.unwrap());
        let waiting = registration.waiting().await.unwrap();
        assert_eq!(waiting.state(), WorkerState::Waiting);
        assert_eq!(registration.active().await.unwrap().cache_name(), "faro-formoso-v1");
        assert_eq!(registration.cache().bucket_names().await.unwrap().len(), 2);

        registration.post_message(ClientMessage::SkipWaiting).await.unwrap();
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.active().await.unwrap().cache_name(), "faro-formoso-v2");
        assert_eq!(waiting.state(), WorkerState::Active);
        assert_eq!(registration.cache().bucket_names().await.unwrap(), vec!["faro-formoso-v2".to_string()]);

        registration.post_message(ClientMessage::SkipWaiting).await.unwrap();
        assert_eq!(registration.active().await.unwrap().cache_name(), "faro-formoso-v2");
    }

    #[tokio::test]
    async fn test_newer_waiting_version_replaces_older_waiting() {
        let network = ScriptedNetwork::new();
        let registration = registered(network).await;

        registration.update(settings("v2", false)).await.unwrap();
        let v2 = registration.waiting().await.unwrap();
        registration.update(settings("v3", false)).await.unwrap();

        assert_eq!(v2.state(), WorkerState::Redundant);
        assert_eq!(registration.waiting().await.unwrap().cache_name(), "faro-formoso-v3");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_current_version() {
        let network = ScriptedNetwork::new();
        let registration = registered(network.clone()).await;

        network.set_online(false);
        let result = registration.update(settings("v2", true)).await;
        assert!(matches!(result, Err(Error::PrecacheFailed { .. })));

        let status = registration.status().await.unwrap();
        assert_eq!(status.active.unwrap().cache_name, "faro-formoso-v1");
        assert!(status.waiting.is_none());
        assert_eq!(status.buckets.len(), 1);

        let response = registration.fetch(Request::navigate(absolute("/"))).await.unwrap().unwrap();
        assert_eq!(response.text(), "<h1>v1</h1>");
    }

    #[tokio::test]
    async fn test_cache_urls_routes_to_active() {
        let network = ScriptedNetwork::new();
        network.serve("/data/farmacias.json", 200, "application/json", "[]");
        let registration = registered(network).await;

        let message = ClientMessage::CacheUrls { urls: vec!["/data/farmacias.json".into()] };
        registration.post_message(message.clone()).await.unwrap();
        registration.post_message(message).await.unwrap();

        let status = registration.status().await.unwrap();
        assert_eq!(status.buckets[0].entries, 3);
    }

    #[tokio::test]
    async fn test_cache_urls_without_active_worker() {
        let registration = Registration::new(CacheDb::open_in_memory().await.unwrap(), ScriptedNetwork::new());
        let message = ClientMessage::CacheUrls { urls: vec!["/data/farmacias.json".into()] };
        assert!(matches!(registration.post_message(message).await, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_poll_update_swallows_load_errors() {
        let registration = registered(ScriptedNetwork::new()).await;
        poll_update(&registration, &|| Err(Error::Config("broken".into()))).await;
        assert_eq!(registration.active().await.unwrap().cache_name(), "faro-formoso-v1");
    }

    #[tokio::test]
    async fn test_update_polling_installs_new_version() {
        let network = ScriptedNetwork::new();
        let registration = Arc::new(registered(network).await);

        let handle =
            spawn_update_polling(registration.clone(), Duration::from_millis(20), || Ok(settings("v2", true)));

        crate::testing::eventually(|| {
            let registration = registration.clone();
            async move {
                registration
                    .active()
                    .await
                    .is_some_and(|w| w.cache_name() == "faro-formoso-v2")
            }
        })
        .await;
        handle.abort();
    }
}
