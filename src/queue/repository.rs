//! SQLite-backed task queue.
//!
//! Tasks move `pending -> running -> done`. A running task holds a lease;
//! when the lease expires without completion (worker crash) the task is
//! claimable again. Failed attempts go back to `pending` with exponential
//! backoff until the maximum number of attempts, then to `dead`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use super::types::{Task, TaskQueue, TaskRecord, TaskStatus};
use crate::datetime::Clock;
use crate::db::Database;
use crate::{FeedcastError, Result};

/// Upper bound on the backoff between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    queue_name: String,
    path: String,
    payload: String,
    status: String,
    attempts: i64,
    available_at: i64,
    last_error: Option<String>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = FeedcastError;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(TaskRecord {
            task: Task {
                id: row.id,
                queue_name: row.queue_name,
                path: row.path,
                payload: row.payload,
            },
            status: row.status.parse()?,
            attempts: row.attempts.max(0) as u32,
            available_at: row.available_at,
            last_error: row.last_error,
        })
    }
}

const TASK_COLUMNS: &str = "id, queue_name, path, payload, status, attempts, available_at, last_error";

/// Retry schedule for failed tasks.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after which a task is given up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following attempt number `attempts`.
    ///
    /// Adds up to half the base delay of random jitter.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF);

        let jitter_ms = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        backoff + jitter
    }
}

/// Persistent queue stored in the `tasks` table.
#[derive(Clone)]
pub struct SqliteTaskQueue {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskQueue {
    /// Create a queue over `db`.
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now_secs(&self) -> i64 {
        self.clock.now().timestamp()
    }

    /// Claim up to `limit` due tasks, leasing each for `lease`.
    ///
    /// Due tasks are pending tasks whose `available_at` has passed and
    /// running tasks whose lease has expired. Claiming increments the
    /// attempt counter.
    pub async fn claim(&self, limit: usize, lease: Duration) -> Result<Vec<TaskRecord>> {
        let now = self.now_secs();
        let lease_until = now + lease.as_secs() as i64;

        let sql = format!(
            "UPDATE tasks
             SET status = 'running', attempts = attempts + 1, lease_until = $1
             WHERE id IN (
                 SELECT id FROM tasks
                 WHERE (status = 'pending' AND available_at <= $2)
                    OR (status = 'running' AND lease_until <= $2)
                 ORDER BY available_at, created_at
                 LIMIT $3
             )
             RETURNING {}",
            TASK_COLUMNS
        );

        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(lease_until)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    /// Mark a claimed task as done.
    pub async fn complete(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'done', lease_until = NULL, last_error = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        debug!("Task {} done", id);
        Ok(())
    }

    /// Record a failed attempt, scheduling a retry or burying the task.
    ///
    /// Returns the task's new status.
    pub async fn fail(
        &self,
        record: &TaskRecord,
        error: &str,
        policy: &RetryPolicy,
    ) -> Result<TaskStatus> {
        if record.attempts >= policy.max_attempts {
            sqlx::query(
                "UPDATE tasks SET status = 'dead', lease_until = NULL, last_error = $2 WHERE id = $1",
            )
            .bind(&record.task.id)
            .bind(error)
            .execute(self.db.pool())
            .await?;

            warn!(
                "Task {} ({}) dead after {} attempts: {}",
                record.task.id, record.task.path, record.attempts, error
            );
            return Ok(TaskStatus::Dead);
        }

        let delay = policy.delay_for(record.attempts);
        let available_at = self.now_secs() + delay.as_secs() as i64;

        sqlx::query(
            "UPDATE tasks
             SET status = 'pending', lease_until = NULL, last_error = $2, available_at = $3
             WHERE id = $1",
        )
        .bind(&record.task.id)
        .bind(error)
        .bind(available_at)
        .execute(self.db.pool())
        .await?;

        debug!(
            "Task {} retry in {}s (attempt {}): {}",
            record.task.id,
            delay.as_secs(),
            record.attempts,
            error
        );
        Ok(TaskStatus::Pending)
    }

    /// Bury a task immediately, regardless of its attempts.
    pub async fn bury(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'dead', lease_until = NULL, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(self.db.pool())
        .await?;

        warn!("Task {} buried: {}", id, error);
        Ok(())
    }

    /// Get a task by id.
    pub async fn get(&self, id: &str) -> Result<Option<TaskRecord>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(TaskRecord::try_from).transpose()
    }

    /// List tasks in `status`, oldest first.
    pub async fn list(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE status = $1 ORDER BY created_at, id",
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(status.as_str())
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    /// Count tasks in `status`.
    pub async fn count(&self, status: TaskStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn push(&self, task: Task) -> Result<()> {
        sqlx::query(
            "INSERT INTO tasks (id, queue_name, path, payload, available_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&task.id)
        .bind(&task.queue_name)
        .bind(&task.path)
        .bind(&task.payload)
        .bind(self.now_secs())
        .execute(self.db.pool())
        .await
        .map_err(|e| FeedcastError::Queue(format!("failed to push task {}: {}", task.id, e)))?;

        debug!("Queued task {} on {}", task.id, task.queue_name);
        Ok(())
    }

    async fn push_multi(&self, tasks: Vec<Task>) -> Result<()> {
        let now = self.now_secs();
        let mut tx = self.db.begin().await?;

        for task in &tasks {
            sqlx::query(
                "INSERT INTO tasks (id, queue_name, path, payload, available_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&task.id)
            .bind(&task.queue_name)
            .bind(&task.path)
            .bind(&task.payload)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| FeedcastError::Queue(format!("failed to push task {}: {}", task.id, e)))?;
        }

        tx.commit().await?;
        debug!("Queued {} tasks", tasks.len());
        Ok(())
    }
}

impl std::fmt::Debug for SqliteTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTaskQueue").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::FixedClock;
    use crate::queue::Channel;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (SqliteTaskQueue, Arc<FixedClock>) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        (SqliteTaskQueue::new(db, clock.clone()), clock)
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_push_and_claim() {
        let (queue, _) = setup().await;
        let task = Task::new(Channel::Post, &"hello").unwrap();
        queue.push(task.clone()).await.unwrap();

        let claimed = queue.claim(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].task, task);
        assert_eq!(claimed[0].status, TaskStatus::Running);
        assert_eq!(claimed[0].attempts, 1);

        // Leased, so not claimable again
        assert!(queue.claim(10, Duration::from_secs(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete() {
        let (queue, _) = setup().await;
        let task = Task::new(Channel::Broadcast, &"hello").unwrap();
        queue.push(task.clone()).await.unwrap();
        queue.claim(1, Duration::from_secs(30)).await.unwrap();

        queue.complete(&task.id).await.unwrap();

        let record = queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Done);
        assert_eq!(queue.count(TaskStatus::Done).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed() {
        let (queue, clock) = setup().await;
        let task = Task::new(Channel::Post, &"hello").unwrap();
        queue.push(task.clone()).await.unwrap();
        queue.claim(1, Duration::from_secs(30)).await.unwrap();

        clock.set(clock.now() + chrono::Duration::seconds(31));

        let claimed = queue.claim(1, Duration::from_secs(30)).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_fail_schedules_retry() {
        let (queue, clock) = setup().await;
        let task = Task::new(Channel::Post, &"hello").unwrap();
        queue.push(task.clone()).await.unwrap();
        let claimed = queue.claim(1, Duration::from_secs(30)).await.unwrap();

        let status = queue.fail(&claimed[0], "timeout", &policy(3)).await.unwrap();
        assert_eq!(status, TaskStatus::Pending);

        let record = queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(record.last_error.as_deref(), Some("timeout"));
        assert!(record.available_at >= clock.now().timestamp() + 10);

        // Not due yet
        assert!(queue.claim(1, Duration::from_secs(30)).await.unwrap().is_empty());

        clock.set(clock.now() + chrono::Duration::seconds(60));
        assert_eq!(queue.claim(1, Duration::from_secs(30)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_buries_after_max_attempts() {
        let (queue, _) = setup().await;
        let task = Task::new(Channel::Post, &"hello").unwrap();
        queue.push(task.clone()).await.unwrap();
        let claimed = queue.claim(1, Duration::from_secs(30)).await.unwrap();

        let status = queue.fail(&claimed[0], "rejected", &policy(1)).await.unwrap();
        assert_eq!(status, TaskStatus::Dead);
        assert_eq!(queue.count(TaskStatus::Dead).await.unwrap(), 1);
        assert!(queue.claim(1, Duration::from_secs(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_multi_is_atomic() {
        let (queue, _) = setup().await;
        let first = Task::new(Channel::Post, &"a").unwrap();
        let duplicate = first.clone();

        let result = queue.push_multi(vec![first, duplicate]).await;
        assert!(matches!(result, Err(FeedcastError::Queue(_))));
        assert_eq!(queue.count(TaskStatus::Pending).await.unwrap(), 0);

        let tasks = vec![
            Task::new(Channel::Post, &"a").unwrap(),
            Task::new(Channel::Broadcast, &"b").unwrap(),
        ];
        queue.push_multi(tasks).await.unwrap();
        assert_eq!(queue.list(TaskStatus::Pending).await.unwrap().len(), 2);
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = policy(5);

        let first = policy.delay_for(1);
        assert!(first >= Duration::from_secs(10) && first <= Duration::from_secs(15));

        let third = policy.delay_for(3);
        assert!(third >= Duration::from_secs(40) && third <= Duration::from_secs(45));

        assert!(policy.delay_for(30) <= MAX_BACKOFF + Duration::from_secs(5));
    }
}
