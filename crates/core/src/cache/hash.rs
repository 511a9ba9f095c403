//! Entry key generation.

use sha2::{Digest, Sha256};

/// Compute the key of a cache entry.
///
/// The bucket name is part of the key, so the same URL stored by two worker
/// versions yields two distinct entries.
pub fn compute_entry_key(bucket: &str, method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bucket.as_bytes());
    hasher.update(b"\n");
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
