//! Idempotency records.
//!
//! One record per (channel, item key). A record is written in the same
//! transaction that checks for it, so of two concurrent enqueues of the same
//! item exactly one sees "absent" and commits.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::db::{is_busy, is_unique_violation, DbPool};
use crate::queue::Channel;
use crate::Result;

/// Pause between attempts when SQLite reports the database busy.
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Idempotency key for an entry URL: hex SHA-256.
pub fn idempotency_key(entry_url: &str) -> String {
    format!("{:x}", Sha256::digest(entry_url.as_bytes()))
}

/// Repository for idempotency records.
pub struct IdempotencyRepository<'a> {
    pool: &'a DbPool,
    attempts: u32,
}

impl<'a> IdempotencyRepository<'a> {
    /// Create a repository retrying busy transactions up to `attempts` times.
    pub fn new(pool: &'a DbPool, attempts: u32) -> Self {
        Self {
            pool,
            attempts: attempts.max(1),
        }
    }

    /// Whether a record exists, outside any transaction.
    pub async fn exists(&self, channel: Channel, key: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM idempotency_records WHERE channel = $1 AND id = $2)",
        )
        .bind(channel.as_str())
        .bind(key)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Record (channel, key) unless it is already recorded.
    ///
    /// Returns `true` when this call wrote the record.
    pub async fn try_mark(&self, channel: Channel, key: &str, entry_url: &str) -> Result<bool> {
        let mut attempt = 1;
        loop {
            match self.mark_once(channel, key, entry_url).await {
                Ok(marked) => return Ok(marked),
                Err(e) if is_busy(&e) && attempt < self.attempts => {
                    warn!(
                        "Idempotency transaction busy (attempt {}/{}): {}",
                        attempt, self.attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(BUSY_RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn mark_once(
        &self,
        channel: Channel,
        key: &str,
        entry_url: &str,
    ) -> std::result::Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM idempotency_records WHERE channel = $1 AND id = $2)",
        )
        .bind(channel.as_str())
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            tx.rollback().await?;
            return Ok(false);
        }

        let inserted = sqlx::query(
            "INSERT INTO idempotency_records (channel, id, entry_url) VALUES ($1, $2, $3)",
        )
        .bind(channel.as_str())
        .bind(key)
        .bind(entry_url)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!("Concurrent writer recorded {} on {}", key, channel);
                tx.rollback().await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Count records for a channel.
    pub async fn count(&self, channel: Channel) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_records WHERE channel = $1")
                .bind(channel.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_idempotency_key() {
        let key = idempotency_key("https://example.com/1");
        assert_eq!(key.len(), 64);
        assert_eq!(key, idempotency_key("https://example.com/1"));
        assert_ne!(key, idempotency_key("https://example.com/2"));
    }

    #[tokio::test]
    async fn test_try_mark_once() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = IdempotencyRepository::new(db.pool(), 3);
        let key = idempotency_key("https://example.com/1");

        assert!(repo.try_mark(Channel::Post, &key, "https://example.com/1").await.unwrap());
        assert!(!repo.try_mark(Channel::Post, &key, "https://example.com/1").await.unwrap());
        assert!(repo.exists(Channel::Post, &key).await.unwrap());
        assert_eq!(repo.count(Channel::Post).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = IdempotencyRepository::new(db.pool(), 3);
        let key = idempotency_key("https://example.com/1");

        assert!(repo.try_mark(Channel::Post, &key, "https://example.com/1").await.unwrap());
        assert!(repo
            .try_mark(Channel::Broadcast, &key, "https://example.com/1")
            .await
            .unwrap());
        assert!(!repo.exists(Channel::Post, "other").await.unwrap());
    }
}
