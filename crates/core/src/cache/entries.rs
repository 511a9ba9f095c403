//! Entry CRUD operations.
//!
//! Provides functions for storing, matching and counting cached responses
//! inside a bucket.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::http::{Response, ResponseSource};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub hash: String,
    pub bucket: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Capture a response for storage in `bucket` under `method` + `url`.
    pub fn from_response(bucket: &str, method: &str, url: &str, response: &Response) -> Self {
        let headers_json = if response.headers.is_empty() {
            None
        } else {
            serde_json::to_string(&response.headers).ok()
        };

        Self {
            hash: compute_entry_key(bucket, method, url),
            bucket: bucket.to_string(),
            url: url.to_string(),
            method: method.to_ascii_uppercase(),
            status_code: response.status,
            content_type: response.content_type.clone(),
            headers_json,
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild the response this entry was captured from.
    pub fn into_response(self) -> Response {
        let headers = self
            .headers_json
            .as_deref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default();

        Response {
            url: self.url,
            status: self.status_code,
            content_type: self.content_type,
            headers,
            body: self.body.into(),
            source: ResponseSource::Cache,
        }
    }
}

fn insert_entry(conn: &rusqlite::Connection, entry: &CacheEntry) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO entries (
            hash, bucket, url, method, status_code, content_type, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(hash) DO UPDATE SET
            status_code = excluded.status_code,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            &entry.hash,
            &entry.bucket,
            &entry.url,
            &entry.method,
            entry.status_code,
            &entry.content_type,
            &entry.headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Insert or overwrite an entry in an existing bucket.
    ///
    /// Returns false without writing when the bucket is gone, e.g. when a
    /// late write from a replaced version lands after its bucket was evicted.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<bool, Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![&entry.bucket],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Ok(false);
                }
                insert_entry(&tx, &entry)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite several entries in one transaction, creating their
    /// buckets if absent.
    ///
    /// Either every entry is written or none is.
    pub async fn put_entries(&self, entries: Vec<CacheEntry>) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    tx.execute(
                        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                        params![&entry.bucket, &entry.stored_at],
                    )?;
                    insert_entry(&tx, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry for `method` + `url` in `bucket`.
    pub async fn match_entry(&self, bucket: &str, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let hash = compute_entry_key(bucket, method, url);
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT hash, bucket, url, method, status_code, content_type, headers_json, body, stored_at
                     FROM entries WHERE hash = ?1",
                )?;

                let result = stmt.query_row(params![hash], |row| {
                    Ok(CacheEntry {
                        hash: row.get(0)?,
                        bucket: row.get(1)?,
                        url: row.get(2)?,
                        method: row.get(3)?,
                        status_code: row.get(4)?,
                        content_type: row.get(5)?,
                        headers_json: row.get(6)?,
                        body: row.get(7)?,
                        stored_at: row.get(8)?,
                    })
                });

                match result {
                    Ok(e) => Ok(Some(e)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a bucket.
    pub async fn entry_count(&self, bucket: &str) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE bucket = ?1", params![bucket], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a bucket, in insertion order.
    pub async fn entry_urls(&self, bucket: &str) -> Result<Vec<String>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE bucket = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![bucket], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
