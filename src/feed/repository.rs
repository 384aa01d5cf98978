//! Latest-entry repository.
//!
//! Remembers, per source, the newest entry URL already handed to the
//! enqueue stages so the next crawl only returns newer entries.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::types::LatestEntry;
use crate::db::DbPool;
use crate::Result;

#[derive(sqlx::FromRow)]
struct LatestEntryRow {
    code: String,
    url: String,
    updated_at: NaiveDateTime,
}

impl From<LatestEntryRow> for LatestEntry {
    fn from(row: LatestEntryRow) -> Self {
        LatestEntry {
            code: row.code,
            url: row.url,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        }
    }
}

/// Repository for per-source latest entry markers.
pub struct LatestEntryRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> LatestEntryRepository<'a> {
    /// Create a new repository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get the marker for a source.
    pub async fn get(&self, code: &str) -> Result<Option<LatestEntry>> {
        let row = sqlx::query_as::<_, LatestEntryRow>(
            "SELECT code, url, updated_at FROM latest_entries WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All markers keyed by source code.
    pub async fn all_urls(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, LatestEntryRow>(
            "SELECT code, url, updated_at FROM latest_entries",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.code, row.url)).collect())
    }

    /// Move the marker for a source to `url`.
    pub async fn save(&self, code: &str, url: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO latest_entries (code, url, updated_at) VALUES ($1, $2, datetime('now'))
             ON CONFLICT(code) DO UPDATE SET url = excluded.url, updated_at = excluded.updated_at",
        )
        .bind(code)
        .bind(url)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
