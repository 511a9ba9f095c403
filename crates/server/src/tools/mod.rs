//! MCP tool implementations.
//!
//! This module contains all tools exposed by the faro-sw server.

pub mod cache;
pub mod sw_fetch;
pub mod sw_message;
pub mod sw_status;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{CacheGetParams, get_impl};
pub use sw_fetch::{SwFetchParams, fetch_impl};
pub use sw_message::{SwMessageParams, message_impl};
pub use sw_status::{SwStatusParams, status_impl};
