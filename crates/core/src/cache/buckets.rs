//! Bucket operations: create, list, delete.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// A bucket name with its entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketInfo {
    pub name: String,
    pub entries: u64,
}

impl CacheDb {
    /// Create the bucket if it does not exist. Opening an existing bucket is a no-op.
    pub async fn open_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All bucket names, oldest first.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Bucket names with entry counts, oldest first.
    pub async fn bucket_inventory(&self) -> Result<Vec<BucketInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, COUNT(e.hash) FROM buckets b
                     LEFT JOIN entries e ON e.bucket = b.name
                     GROUP BY b.name
                     ORDER BY b.created_at ASC, b.name ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(BucketInfo { name: row.get(0)?, entries: row.get::<_, i64>(1)? as u64 })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every bucket except `keep`, with their entries, in one
    /// transaction. Returns the names that were deleted.
    pub async fn delete_buckets_except(&self, keep: &str) -> Result<Vec<String>, Error> {
        let keep = keep.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let stale = {
                    let mut stmt =
                        tx.prepare("SELECT name FROM buckets WHERE name != ?1 ORDER BY created_at ASC, name ASC")?;
                    stmt.query_map(params![keep], |row| row.get(0))?
                        .collect::<Result<Vec<String>, rusqlite::Error>>()?
                };
                tx.execute("DELETE FROM entries WHERE bucket != ?1", params![keep])?;
                tx.execute("DELETE FROM buckets WHERE name != ?1", params![keep])?;
                tx.commit()?;
                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }
}
