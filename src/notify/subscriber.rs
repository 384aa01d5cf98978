//! Subscriber repository.

use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use super::types::Subscriber;
use crate::db::DbPool;
use crate::{FeedcastError, Result};

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    id: String,
    token: String,
    created_at: NaiveDateTime,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber {
            id: row.id,
            token: row.token,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        }
    }
}

/// Subscriber id for a token.
pub fn subscriber_id(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Repository for push-notification subscribers.
///
/// Owns a pool handle so it can be moved into per-recipient send tasks.
#[derive(Clone)]
pub struct SubscriberRepository {
    pool: DbPool,
}

impl SubscriberRepository {
    /// Create a new repository.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a token. Registering the same token twice is a no-op.
    pub async fn save(&self, token: &str) -> Result<Subscriber> {
        let token = token.trim();
        if token.is_empty() {
            return Err(FeedcastError::Validation("token must not be empty".to_string()));
        }

        let id = subscriber_id(token);
        sqlx::query("INSERT INTO subscribers (id, token) VALUES ($1, $2) ON CONFLICT(id) DO NOTHING")
            .bind(&id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| FeedcastError::NotFound(format!("subscriber {}", id)))
    }

    /// Get a subscriber by id.
    pub async fn get(&self, id: &str) -> Result<Option<Subscriber>> {
        let row = sqlx::query_as::<_, SubscriberRow>(
            "SELECT id, token, created_at FROM subscribers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List every subscriber.
    pub async fn list_all(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            "SELECT id, token, created_at FROM subscribers ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete a subscriber. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscribers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count subscribers.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscribers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
