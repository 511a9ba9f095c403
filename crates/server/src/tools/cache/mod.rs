//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the worker's bucket.

pub mod get;

pub use get::{CacheGetParams, get_impl};
