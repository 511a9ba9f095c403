//! Offline cache manager for the Faro Formoso web app.
//!
//! This crate provides the request classifier, the caching strategies, the
//! worker lifecycle and the registration that routes events to the active
//! worker version. Storage and shared types live in `faro-core`.

pub mod classify;
pub mod fetch;
pub mod registration;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{ClassifyRules, HostSet, ResourceClass};
pub use fetch::{FetchClient, FetchConfig, Network};
pub use registration::{Registration, RegistrationStatus, WorkerInfo, poll_update, spawn_update_polling};
pub use strategy::{Strategy, StrategyContext};
pub use worker::{LifecycleHooks, OfflineCacheManager, WorkerSettings, WorkerState};
