//! Core types and shared functionality for faro-sw.
//!
//! This crate provides:
//! - Cache storage (versioned buckets) with a SQLite backend
//! - Request/response and client message types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod message;

pub use cache::{CacheDb, CacheEntry};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, RequestMode, Response, ResponseSource};
pub use message::ClientMessage;
