//! Live status repository.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::db::DbPool;
use crate::Result;

/// Id of the single live status record.
pub const LIVE_STATUS_ID: &str = "live";

/// Persisted live state.
#[derive(Debug, Clone)]
pub struct LiveStatus {
    /// Record id.
    pub id: String,
    /// Whether the stream was live at the last transition.
    pub is_live: bool,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LiveStatusRow {
    id: String,
    is_live: bool,
    updated_at: NaiveDateTime,
}

impl From<LiveStatusRow> for LiveStatus {
    fn from(row: LiveStatusRow) -> Self {
        LiveStatus {
            id: row.id,
            is_live: row.is_live,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        }
    }
}

/// Repository for live status records.
pub struct LiveStatusRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> LiveStatusRepository<'a> {
    /// Create a new repository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a status record.
    pub async fn get(&self, id: &str) -> Result<Option<LiveStatus>> {
        let row = sqlx::query_as::<_, LiveStatusRow>(
            "SELECT id, is_live, updated_at FROM live_status WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create the record as offline if it does not exist.
    pub async fn ensure(&self, id: &str) -> Result<()> {
        sqlx::query("INSERT INTO live_status (id, is_live) VALUES ($1, 0) ON CONFLICT(id) DO NOTHING")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set the state to `new` only if it is still `expected`.
    ///
    /// Returns whether this call made the change.
    pub async fn compare_and_set(
        &self,
        id: &str,
        expected: bool,
        new: bool,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE live_status SET is_live = $3, updated_at = $4 WHERE id = $1 AND is_live = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(at.naive_utc())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_missing_record() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LiveStatusRepository::new(db.pool());
        assert!(repo.get(LIVE_STATUS_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_is_offline_and_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LiveStatusRepository::new(db.pool());

        repo.ensure(LIVE_STATUS_ID).await.unwrap();
        assert!(repo.compare_and_set(LIVE_STATUS_ID, false, true, Utc::now()).await.unwrap());

        // A second ensure must not reset the state
        repo.ensure(LIVE_STATUS_ID).await.unwrap();
        assert!(repo.get(LIVE_STATUS_ID).await.unwrap().unwrap().is_live);
    }

    #[tokio::test]
    async fn test_compare_and_set_loses_on_stale_expectation() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LiveStatusRepository::new(db.pool());
        repo.ensure(LIVE_STATUS_ID).await.unwrap();

        assert!(repo.compare_and_set(LIVE_STATUS_ID, false, true, Utc::now()).await.unwrap());
        assert!(!repo.compare_and_set(LIVE_STATUS_ID, false, true, Utc::now()).await.unwrap());
    }
}
