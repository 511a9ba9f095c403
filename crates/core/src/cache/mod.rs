//! SQLite-backed cache storage: versioned buckets of request/response pairs.
//!
//! This module provides a persistent bucket store using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Named buckets, one per worker version
//! - Entries keyed by a SHA-256 over bucket, method and URL
//! - Atomic bulk insert for precache and on-demand adds
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
