//! Task queue types.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{FeedcastError, Result};

/// Outbound delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Public microblog post.
    Post,
    /// Push notification broadcast to every subscriber.
    Broadcast,
}

impl Channel {
    /// All channels.
    pub const ALL: [Channel; 2] = [Channel::Post, Channel::Broadcast];

    /// Channel name as stored in idempotency records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Post => "post",
            Channel::Broadcast => "broadcast",
        }
    }

    /// Queue the channel's tasks are pushed to.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Channel::Post => "queue-post",
            Channel::Broadcast => "queue-broadcast",
        }
    }

    /// Handler path the channel's tasks are routed to.
    pub fn path(&self) -> &'static str {
        match self {
            Channel::Post => "/queue/post",
            Channel::Broadcast => "/queue/broadcast",
        }
    }

    /// Channel whose handler path is `path`.
    pub fn from_path(path: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.path() == path)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of deferred work: a handler path plus a serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// Named queue.
    pub queue_name: String,
    /// Handler path.
    pub path: String,
    /// JSON payload.
    pub payload: String,
}

impl Task {
    /// Build a task for `channel` carrying `payload`.
    pub fn new<T: Serialize>(channel: Channel, payload: &T) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            queue_name: channel.queue_name().to_string(),
            path: channel.path().to_string(),
            payload: serde_json::to_string(payload)?,
        })
    }

    /// Channel this task is routed to, if the path is known.
    pub fn channel(&self) -> Option<Channel> {
        Channel::from_path(&self.path)
    }

    /// Decode the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.payload).map_err(|e| {
            FeedcastError::Serialization(format!("task {} payload: {}", self.id, e))
        })
    }
}

/// Lifecycle state of a persisted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting until `available_at`.
    Pending,
    /// Claimed by a worker until its lease expires.
    Running,
    /// Handled successfully.
    Done,
    /// Gave up after the maximum number of attempts.
    Dead,
}

impl TaskStatus {
    /// Convert to database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Dead => "dead",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = FeedcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "done" => Ok(TaskStatus::Done),
            "dead" => Ok(TaskStatus::Dead),
            other => Err(FeedcastError::Queue(format!("unknown task status: {}", other))),
        }
    }
}

/// A task as stored in the queue, with its delivery bookkeeping.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// The task.
    pub task: Task,
    /// Current state.
    pub status: TaskStatus,
    /// Delivery attempts so far, including a running one.
    pub attempts: u32,
    /// Unix seconds at which the task becomes claimable.
    pub available_at: i64,
    /// Error of the last failed attempt.
    pub last_error: Option<String>,
}

/// A queue accepting tasks for asynchronous, retried execution.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Add one task.
    async fn push(&self, task: Task) -> Result<()>;

    /// Add several tasks atomically: either all are queued or none is.
    async fn push_multi(&self, tasks: Vec<Task>) -> Result<()>;
}

/// Executes tasks routed to one handler path.
///
/// An `Err` makes the queue retry the task later.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Handle one task, finishing before `deadline`.
    async fn handle(&self, task: &Task, deadline: Instant) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_routing() {
        assert_eq!(Channel::Post.queue_name(), "queue-post");
        assert_eq!(Channel::Broadcast.path(), "/queue/broadcast");
        assert_eq!(Channel::from_path("/queue/post"), Some(Channel::Post));
        assert_eq!(Channel::from_path("/queue/unknown"), None);
        assert_eq!(Channel::Broadcast.to_string(), "broadcast");
    }

    #[test]
    fn test_task_new_and_decode() {
        let task = Task::new(Channel::Post, &vec!["a", "b"]).unwrap();

        assert_eq!(task.queue_name, "queue-post");
        assert_eq!(task.channel(), Some(Channel::Post));
        assert!(uuid::Uuid::parse_str(&task.id).is_ok());

        let decoded: Vec<String> = task.decode().unwrap();
        assert_eq!(decoded, vec!["a", "b"]);
    }

    #[test]
    fn test_task_decode_error() {
        let task = Task {
            id: "t1".to_string(),
            queue_name: "queue-post".to_string(),
            path: "/queue/post".to_string(),
            payload: "{not json".to_string(),
        };

        let result: Result<Vec<String>> = task.decode();
        assert!(matches!(result, Err(FeedcastError::Serialization(_))));
    }

    #[test]
    fn test_task_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Done,
            TaskStatus::Dead,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("paused".parse::<TaskStatus>().is_err());
    }
}
