//! Task queue for feedcast.
//!
//! Enqueue stages and the live watcher push [`Task`]s; the
//! [`QueueWorker`] drains them through the handler registered for each
//! task's path, retrying failures with backoff.

mod repository;
mod types;
mod worker;

pub use repository::{RetryPolicy, SqliteTaskQueue};
pub use types::{Channel, Task, TaskHandler, TaskQueue, TaskRecord, TaskStatus};
pub use worker::{DrainReport, QueueWorker};
