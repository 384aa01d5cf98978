//! Queue worker.
//!
//! Claims due tasks, routes each to the handler registered for its path and
//! records the outcome. Every task runs under its own deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::repository::{RetryPolicy, SqliteTaskQueue};
use super::types::{Channel, TaskHandler, TaskRecord, TaskStatus};
use crate::config::QueueConfig;
use crate::deadline::{after_secs, run_until};
use crate::Result;

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Tasks handled successfully.
    pub completed: usize,
    /// Tasks rescheduled after a failed attempt.
    pub retried: usize,
    /// Tasks given up.
    pub dead: usize,
}

impl DrainReport {
    /// Total tasks processed.
    pub fn processed(&self) -> usize {
        self.completed + self.retried + self.dead
    }
}

enum TaskOutcome {
    Completed,
    Retried,
    Dead,
}

/// Drains the task queue through the registered handlers.
pub struct QueueWorker {
    queue: SqliteTaskQueue,
    handlers: HashMap<Channel, Arc<dyn TaskHandler>>,
    policy: RetryPolicy,
    concurrency: usize,
    task_deadline_secs: u64,
}

impl QueueWorker {
    /// Create a worker with no handlers.
    pub fn new(queue: SqliteTaskQueue, config: &QueueConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            policy: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: Duration::from_secs(config.retry_base_secs),
            },
            concurrency: config.concurrency.max(1),
            task_deadline_secs: config.task_deadline_secs,
        }
    }

    /// Route tasks for `channel` to `handler`.
    pub fn with_handler(mut self, channel: Channel, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(channel, handler);
        self
    }

    /// The underlying queue.
    pub fn queue(&self) -> &SqliteTaskQueue {
        &self.queue
    }

    /// Lease length for claimed tasks; a little longer than the task deadline.
    fn lease(&self) -> Duration {
        Duration::from_secs(self.task_deadline_secs + 5)
    }

    /// Process due tasks until none is left.
    ///
    /// A task rescheduled during the pass is claimed again in the same pass
    /// once its backoff has elapsed; the attempt limit bounds the pass.
    pub async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        loop {
            let batch = self.queue.claim(self.concurrency, self.lease()).await?;
            if batch.is_empty() {
                break;
            }
            debug!("Claimed {} tasks", batch.len());

            let outcomes: Vec<Result<TaskOutcome>> = stream::iter(batch)
                .map(|record| self.execute(record))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome? {
                    TaskOutcome::Completed => report.completed += 1,
                    TaskOutcome::Retried => report.retried += 1,
                    TaskOutcome::Dead => report.dead += 1,
                }
            }
        }

        if report.processed() > 0 {
            info!(
                "Queue drained: {} completed, {} retried, {} dead",
                report.completed, report.retried, report.dead
            );
        }
        Ok(report)
    }

    async fn execute(&self, record: TaskRecord) -> Result<TaskOutcome> {
        let task = &record.task;
        let Some(handler) = task.channel().and_then(|c| self.handlers.get(&c)) else {
            error!("No handler for task {} at path {}", task.id, task.path);
            self.queue
                .bury(&task.id, &format!("no handler for path {}", task.path))
                .await?;
            return Ok(TaskOutcome::Dead);
        };

        let deadline = after_secs(self.task_deadline_secs);
        let what = format!("task {}", task.id);
        match run_until(deadline, &what, handler.handle(task, deadline)).await {
            Ok(()) => {
                self.queue.complete(&task.id).await?;
                Ok(TaskOutcome::Completed)
            }
            Err(e) => {
                warn!("Task {} ({}) failed: {}", task.id, task.path, e);
                match self.queue.fail(&record, &e.to_string(), &self.policy).await? {
                    TaskStatus::Dead => Ok(TaskOutcome::Dead),
                    _ => Ok(TaskOutcome::Retried),
                }
            }
        }
    }

    /// Drain the queue every `interval` until the task is aborted.
    pub async fn run(&self, interval: Duration) {
        info!("Queue worker started (poll interval: {:?})", interval);
        let mut timer = tokio::time::interval(interval);

        loop {
            timer.tick().await;
            if let Err(e) = self.drain().await {
                error!("Queue drain failed: {}", e);
            }
        }
    }
}
