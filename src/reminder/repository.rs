//! Reminder repository.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::db::DbPool;
use crate::{FeedcastError, Result};

/// A one-shot reminder.
#[derive(Debug, Clone)]
pub struct Reminder {
    /// Record id.
    pub id: String,
    /// Message broadcast when the reminder is due.
    pub text: String,
    /// When to remind.
    pub remind_at: DateTime<Utc>,
    /// Disabled reminders are never broadcast.
    pub enabled: bool,
}

#[derive(sqlx::FromRow)]
struct ReminderRow {
    id: String,
    text: String,
    remind_at: NaiveDateTime,
    enabled: bool,
}

impl From<ReminderRow> for Reminder {
    fn from(row: ReminderRow) -> Self {
        Reminder {
            id: row.id,
            text: row.text,
            remind_at: DateTime::from_naive_utc_and_offset(row.remind_at, Utc),
            enabled: row.enabled,
        }
    }
}

/// Repository for reminders.
pub struct ReminderRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ReminderRepository<'a> {
    /// Create a new repository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a new reminder.
    pub async fn create(
        &self,
        text: &str,
        remind_at: DateTime<Utc>,
        enabled: bool,
    ) -> Result<Reminder> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedcastError::Validation(
                "reminder text must not be empty".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO reminders (id, text, remind_at, enabled) VALUES ($1, $2, $3, $4)")
            .bind(&id)
            .bind(text)
            .bind(remind_at.naive_utc())
            .bind(enabled)
            .execute(self.pool)
            .await?;

        Ok(Reminder {
            id,
            text: text.to_string(),
            remind_at,
            enabled,
        })
    }

    /// Enabled reminders, earliest first.
    pub async fn list_enabled(&self) -> Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRow>(
            "SELECT id, text, remind_at, enabled FROM reminders WHERE enabled = 1 ORDER BY remind_at",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Enable or disable a reminder. Returns whether it exists.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE reminders SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record that the reminder was broadcast for `minute`.
    ///
    /// Returns false when it was already recorded for that minute, so only
    /// one of several overlapping checks queues the broadcast.
    pub async fn mark_notified(&self, id: &str, minute: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reminders SET notified_for = $2 \
             WHERE id = $1 AND (notified_for IS NULL OR notified_for <> $2)",
        )
        .bind(id)
        .bind(minute)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Undo [`mark_notified`](Self::mark_notified) after the broadcast could not be queued.
    pub async fn clear_notified(&self, id: &str, minute: &str) -> Result<()> {
        sqlx::query("UPDATE reminders SET notified_for = NULL WHERE id = $1 AND notified_for = $2")
            .bind(id)
            .bind(minute)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
