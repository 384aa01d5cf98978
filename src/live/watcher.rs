//! Live status watcher.
//!
//! Polls the stream's live state and compares it with the persisted one.
//! Only the offline-to-live edge produces notifications: one post task and
//! one broadcast task, queued together.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use super::checker::LiveStatusChecker;
use super::repository::{LiveStatusRepository, LIVE_STATUS_ID};
use crate::config::LiveConfig;
use crate::datetime::{format_in_timezone, Clock};
use crate::db::Database;
use crate::deadline::run_until;
use crate::notify::{BroadcastMessage, BroadcastTask};
use crate::post::{PostRequest, PostTask};
use crate::queue::{Channel, Task, TaskQueue};
use crate::Result;

/// What a poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Observed state equals the stored state.
    Unchanged,
    /// Offline to live; notifications queued.
    WentLive,
    /// Live to offline.
    WentOffline,
    /// Another poller changed the state first; nothing was done.
    Superseded,
}

/// Stream details used in live notifications.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Display name.
    pub name: String,
    /// Watch URL.
    pub url: String,
}

impl From<&LiveConfig> for StreamInfo {
    fn from(config: &LiveConfig) -> Self {
        Self {
            name: config.stream_name.clone(),
            url: config.stream_url.clone(),
        }
    }
}

/// Watches one stream's live state.
pub struct LiveWatcher {
    db: Database,
    checker: Arc<dyn LiveStatusChecker>,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    stream: StreamInfo,
    timezone: Tz,
}

impl LiveWatcher {
    /// Create a watcher.
    pub fn new(
        db: Database,
        checker: Arc<dyn LiveStatusChecker>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        stream: StreamInfo,
        timezone: Tz,
    ) -> Self {
        Self {
            db,
            checker,
            queue,
            clock,
            stream,
            timezone,
        }
    }

    /// Poll once, finishing before `deadline`.
    pub async fn poll(&self, deadline: Instant) -> Result<Transition> {
        let observed = run_until(deadline, "live status check", self.checker.is_live()).await?;

        let repo = LiveStatusRepository::new(self.db.pool());
        let stored = repo
            .get(LIVE_STATUS_ID)
            .await?
            .map(|status| status.is_live)
            .unwrap_or(false);

        if observed == stored {
            debug!("Live status unchanged (live: {})", stored);
            return Ok(Transition::Unchanged);
        }

        let now = self.clock.now();
        repo.ensure(LIVE_STATUS_ID).await?;
        if !repo.compare_and_set(LIVE_STATUS_ID, stored, observed, now).await? {
            debug!("Live status changed by another poller");
            return Ok(Transition::Superseded);
        }

        if !observed {
            info!("{} went offline", self.stream.name);
            return Ok(Transition::WentOffline);
        }

        info!("{} went live", self.stream.name);
        let started = format_in_timezone(&now, self.timezone, "%Y/%m/%d %H:%M:%S");
        self.queue
            .push_multi(vec![self.post_task(&started)?, self.broadcast_task()?])
            .await?;

        Ok(Transition::WentLive)
    }

    fn post_task(&self, started: &str) -> Result<Task> {
        let text = format!(
            "{} started streaming\nfrom {}\n{}",
            self.stream.name, started, self.stream.url
        );
        Task::new(
            Channel::Post,
            &PostTask {
                requests: vec![PostRequest::text(text)],
            },
        )
    }

    fn broadcast_task(&self) -> Result<Task> {
        let text = format!(
            "\n{} started streaming\n{}",
            self.stream.name, self.stream.url
        );
        Task::new(
            Channel::Broadcast,
            &BroadcastTask {
                messages: vec![BroadcastMessage::new(text, None)],
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::FixedClock;
    use crate::queue::{SqliteTaskQueue, TaskStatus};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Switch(AtomicBool);

    #[async_trait]
    impl LiveStatusChecker for Switch {
        async fn is_live(&self) -> Result<bool> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_went_live_queues_post_and_broadcast() {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
        ));
        let queue = SqliteTaskQueue::new(db.clone(), clock.clone());
        let switch = Arc::new(Switch(AtomicBool::new(true)));
        let watcher = LiveWatcher::new(
            db,
            switch,
            Arc::new(queue.clone()),
            clock,
            StreamInfo {
                name: "Studio".to_string(),
                url: "https://live.example.com/studio".to_string(),
            },
            chrono_tz::Asia::Tokyo,
        );

        assert_eq!(watcher.poll(deadline()).await.unwrap(), Transition::WentLive);
        assert_eq!(watcher.poll(deadline()).await.unwrap(), Transition::Unchanged);

        let tasks = queue.list(TaskStatus::Pending).await.unwrap();
        assert_eq!(tasks.len(), 2);

        let post = tasks
            .iter()
            .find(|t| t.task.channel() == Some(Channel::Post))
            .unwrap();
        let payload: PostTask = post.task.decode().unwrap();
        assert_eq!(
            payload.requests[0].text,
            "Studio started streaming\nfrom 2024/03/01 20:00:00\nhttps://live.example.com/studio"
        );
        assert!(tasks
            .iter()
            .any(|t| t.task.channel() == Some(Channel::Broadcast)));
    }
}
