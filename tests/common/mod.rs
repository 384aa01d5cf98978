//! Test doubles and helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use feedcast::config::QueueConfig;
use feedcast::datetime::SystemClock;
use feedcast::dispatch::{Converter, EnqueueStage};
use feedcast::feed::{FeedFetcher, FeedItem, FeedSource};
use feedcast::live::LiveStatusChecker;
use feedcast::notify::{ImageData, ImageResolver, NotificationSender, SendError};
use feedcast::post::{PostClient, PostRequest};
use feedcast::queue::{Channel, SqliteTaskQueue, TaskQueue};
use feedcast::{Database, FeedcastError, Result};

/// In-memory database with migrations applied.
pub async fn memory_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("Failed to create test database")
}

/// Queue over `db` using the wall clock.
pub fn task_queue(db: &Database) -> SqliteTaskQueue {
    SqliteTaskQueue::new(db.clone(), Arc::new(SystemClock))
}

/// Enqueue stage for `channel` over `db` and `queue`.
pub fn stage(channel: Channel, db: &Database, queue: &SqliteTaskQueue) -> EnqueueStage {
    let queue: Arc<dyn TaskQueue> = Arc::new(queue.clone());
    EnqueueStage::new(
        channel,
        db.clone(),
        queue,
        Arc::new(Converter::new("#feedcast")),
        3,
    )
}

/// Queue configuration that retries immediately.
pub fn fast_queue_config() -> QueueConfig {
    QueueConfig {
        poll_interval_secs: 1,
        task_deadline_secs: 5,
        max_attempts: 2,
        concurrency: 4,
        retry_base_secs: 0,
    }
}

/// An item from `source` with entry number `n`.
pub fn item(source: &str, n: u32) -> FeedItem {
    FeedItem::new(
        source,
        format!("{source} site"),
        format!("https://{source}.example.com"),
        format!("Entry {n}"),
        format!("https://{source}.example.com/entries/{n}"),
    )
}

/// Fetcher serving a fixed newest-first list, honoring `since_url`.
pub struct StaticFetcher {
    items: Vec<FeedItem>,
}

impl StaticFetcher {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, source: &FeedSource, since_url: Option<&str>) -> Result<Vec<FeedItem>> {
        Ok(self
            .items
            .iter()
            .take_while(|item| Some(item.entry_url.as_str()) != since_url)
            .take(source.max_items)
            .cloned()
            .collect())
    }
}

/// Fetcher that always fails.
pub struct FailingFetcher;

#[async_trait]
impl FeedFetcher for FailingFetcher {
    async fn fetch(&self, source: &FeedSource, _since_url: Option<&str>) -> Result<Vec<FeedItem>> {
        Err(FeedcastError::Fetch(format!("{} is down", source.url)))
    }
}

/// Notification sender that records calls and tracks peak concurrency.
///
/// Tokens in `invalid` are answered with [`SendError::InvalidToken`].
#[derive(Default)]
pub struct RecordingSender {
    invalid: HashSet<String>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    sent: Mutex<Vec<(String, String, Option<String>)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invalid<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalid = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Tokens whose sends fail with a transport error.
    pub fn with_failing<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Tokens whose sends never complete.
    pub fn with_hanging<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hanging = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of sends seen in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Recorded `(token, text, image url)` triples.
    pub fn sent(&self) -> Vec<(String, String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        token: &str,
        text: &str,
        image: Option<&ImageData>,
    ) -> std::result::Result<(), SendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(token) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.invalid.contains(token) {
            return Err(SendError::InvalidToken);
        }
        if self.failing.contains(token) {
            return Err(SendError::Transport("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push((
            token.to_string(),
            text.to_string(),
            image.map(|image| image.url.clone()),
        ));
        Ok(())
    }
}

/// Image resolver returning a tiny PNG for any URL and counting calls.
#[derive(Default)]
pub struct StaticImageResolver {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageResolver for StaticImageResolver {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ImageData {
            url: url.to_string(),
            file_name: "image.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

/// Live checker replaying a script of observations.
pub struct ScriptedChecker {
    script: Mutex<VecDeque<bool>>,
}

impl ScriptedChecker {
    pub fn new(script: &[bool]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl LiveStatusChecker for ScriptedChecker {
    async fn is_live(&self) -> Result<bool> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FeedcastError::Fetch("script exhausted".to_string()))
    }
}

/// Post client recording requests; replies carry the id they answer.
#[derive(Default)]
pub struct RecordingPostClient {
    posts: Mutex<Vec<(PostRequest, Option<String>)>>,
}

impl RecordingPostClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(request, in_reply_to)` pairs.
    pub fn posts(&self) -> Vec<(PostRequest, Option<String>)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostClient for RecordingPostClient {
    async fn post(&self, request: &PostRequest, in_reply_to: Option<&str>) -> Result<String> {
        let mut posts = self.posts.lock().unwrap();
        posts.push((request.clone(), in_reply_to.map(str::to_string)));
        Ok(format!("post-{}", posts.len()))
    }
}
