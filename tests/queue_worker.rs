//! Queue worker retry and dead-letter behaviour.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use common::{fast_queue_config, memory_db, task_queue};
use feedcast::post::{PostRequest, PostTask};
use feedcast::queue::{Channel, QueueWorker, Task, TaskHandler, TaskQueue, TaskStatus};
use feedcast::{FeedcastError, Result};

/// Fails the first `failures` calls, then succeeds.
struct FlakyHandler {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyHandler {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn handle(&self, _task: &Task, _deadline: Instant) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FeedcastError::Delivery(format!("upstream 503 (call {call})")))
        } else {
            Ok(())
        }
    }
}

fn post_task() -> Task {
    Task::new(
        Channel::Post,
        &PostTask {
            requests: vec![PostRequest::text("hello https://blog.example.com/1")],
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_transient_failure_is_retried_until_success() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    queue.push(post_task()).await.unwrap();
    let handler = Arc::new(FlakyHandler::new(1));
    let worker = QueueWorker::new(queue.clone(), &fast_queue_config())
        .with_handler(Channel::Post, handler.clone());

    let report = worker.drain().await.unwrap();

    assert_eq!(report.retried, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    assert_eq!(queue.count(TaskStatus::Done).await.unwrap(), 1);
}

#[tokio::test]
async fn test_task_dead_after_max_attempts() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    let task = post_task();
    let id = task.id.clone();
    queue.push(task).await.unwrap();
    let worker = QueueWorker::new(queue.clone(), &fast_queue_config())
        .with_handler(Channel::Post, Arc::new(FlakyHandler::new(usize::MAX)));

    let report = worker.drain().await.unwrap();

    assert_eq!(report.retried, 1);
    assert_eq!(report.dead, 1);
    let record = queue.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Dead);
    assert_eq!(record.attempts, 2);
    assert!(record.last_error.unwrap().contains("upstream 503"));
}

#[tokio::test]
async fn test_task_without_handler_is_buried() {
    let db = memory_db().await;
    let queue = task_queue(&db);
    queue.push(post_task()).await.unwrap();
    let worker = QueueWorker::new(queue.clone(), &fast_queue_config());

    let report = worker.drain().await.unwrap();

    assert_eq!(report.dead, 1);
    assert_eq!(queue.count(TaskStatus::Dead).await.unwrap(), 1);
}
