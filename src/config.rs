//! Configuration module for feedcast.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use chrono::Weekday;
use chrono_tz::Tz;

use crate::{FeedcastError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Attempts for a transaction that hits a locked database.
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: u32,
}

fn default_db_path() -> String {
    "data/feedcast.db".to_string()
}

fn default_transaction_attempts() -> u32 {
    3
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            transaction_attempts: default_transaction_attempts(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file (empty = console only).
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedcast.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// A single crawled source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source code; selects the registered fetcher and keys the latest-entry marker.
    pub code: String,
    /// Feed URL.
    pub url: String,
    /// Maximum number of items to take per crawl (falls back to the crawler default).
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Per-source fetch timeout in seconds (falls back to the crawler default).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Weekdays this source is crawled on (e.g. `["Sun"]`); empty = every day.
    #[serde(default)]
    pub weekdays: Vec<String>,
}

impl SourceConfig {
    /// Parse the configured weekdays.
    pub fn parsed_weekdays(&self) -> Result<Vec<Weekday>> {
        self.weekdays
            .iter()
            .map(|day| {
                day.parse::<Weekday>().map_err(|_| {
                    FeedcastError::Config(format!("source {}: invalid weekday {:?}", self.code, day))
                })
            })
            .collect()
    }
}

/// Crawler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Whether periodic crawling is enabled.
    #[serde(default = "default_crawler_enabled")]
    pub enabled: bool,
    /// Interval between crawl runs in seconds.
    #[serde(default = "default_crawl_interval")]
    pub interval_secs: u64,
    /// Deadline for a whole crawl run in seconds.
    #[serde(default = "default_crawl_deadline")]
    pub deadline_secs: u64,
    /// Default per-source fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Default maximum items per source.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Timezone used for weekday schedules and message timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Crawled sources.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_crawler_enabled() -> bool {
    true
}

fn default_crawl_interval() -> u64 {
    300 // 5 minutes
}

fn default_crawl_deadline() -> u64 {
    50
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_items() -> usize {
    10
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: default_crawler_enabled(),
            interval_secs: default_crawl_interval(),
            deadline_secs: default_crawl_deadline(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_items: default_max_items(),
            max_feed_size_bytes: default_max_feed_size(),
            timezone: default_timezone(),
            sources: vec![],
        }
    }
}

/// Microblog post channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PostConfig {
    /// Whether posting is enabled.
    #[serde(default = "default_channel_enabled")]
    pub enabled: bool,
    /// Status endpoint of the microblog API.
    #[serde(default)]
    pub api_url: String,
    /// Access token for the microblog API.
    #[serde(default)]
    pub access_token: String,
    /// Hashtags appended to every post.
    #[serde(default)]
    pub hashtags: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_channel_enabled() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    20
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            enabled: default_channel_enabled(),
            api_url: String::new(),
            access_token: String::new(),
            hashtags: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Push-notification broadcast configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Whether broadcasting is enabled.
    #[serde(default = "default_channel_enabled")]
    pub enabled: bool,
    /// Notification API endpoint.
    #[serde(default = "default_notify_api_url")]
    pub api_url: String,
    /// Maximum number of sends in flight at once.
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    /// Maximum image size in bytes.
    #[serde(default = "default_max_image_size")]
    pub max_image_bytes: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_api_url() -> String {
    "https://notify-api.line.me/api/notify".to_string()
}

fn default_max_concurrent_sends() -> usize {
    10
}

fn default_max_image_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_channel_enabled(),
            api_url: default_notify_api_url(),
            max_concurrent_sends: default_max_concurrent_sends(),
            max_image_bytes: default_max_image_size(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Live stream watcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Whether the watcher is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Status endpoint returning JSON.
    #[serde(default)]
    pub status_url: String,
    /// JSON pointer to the boolean live flag in the status response.
    #[serde(default = "default_status_pointer")]
    pub status_pointer: String,
    /// Display name of the stream.
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    /// Public URL of the stream.
    #[serde(default)]
    pub stream_url: String,
    /// Poll interval in seconds.
    #[serde(default = "default_live_interval")]
    pub interval_secs: u64,
    /// Deadline for one poll in seconds.
    #[serde(default = "default_live_deadline")]
    pub deadline_secs: u64,
}

fn default_status_pointer() -> String {
    "/is_live".to_string()
}

fn default_stream_name() -> String {
    "Live stream".to_string()
}

fn default_live_interval() -> u64 {
    60
}

fn default_live_deadline() -> u64 {
    30
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            status_url: String::new(),
            status_pointer: default_status_pointer(),
            stream_name: default_stream_name(),
            stream_url: String::new(),
            interval_secs: default_live_interval(),
            deadline_secs: default_live_deadline(),
        }
    }
}

/// Reminder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Whether due reminders are broadcast.
    #[serde(default = "default_reminder_enabled")]
    pub enabled: bool,
    /// Check interval in seconds. At most 60 so no minute is skipped.
    #[serde(default = "default_reminder_interval")]
    pub interval_secs: u64,
    /// Deadline for one check in seconds.
    #[serde(default = "default_reminder_deadline")]
    pub deadline_secs: u64,
}

fn default_reminder_enabled() -> bool {
    true
}

fn default_reminder_interval() -> u64 {
    30
}

fn default_reminder_deadline() -> u64 {
    50
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: default_reminder_enabled(),
            interval_secs: default_reminder_interval(),
            deadline_secs: default_reminder_deadline(),
        }
    }
}

/// Task queue worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Interval between queue drains in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Deadline for one task execution in seconds.
    #[serde(default = "default_task_deadline")]
    pub task_deadline_secs: u64,
    /// Attempts before a task is marked dead.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Number of tasks executed concurrently.
    #[serde(default = "default_queue_concurrency")]
    pub concurrency: usize,
    /// Base retry delay in seconds (doubled per attempt).
    #[serde(default = "default_retry_base")]
    pub retry_base_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_task_deadline() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_queue_concurrency() -> usize {
    4
}

fn default_retry_base() -> u64 {
    10
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            task_deadline_secs: default_task_deadline(),
            max_attempts: default_max_attempts(),
            concurrency: default_queue_concurrency(),
            retry_base_secs: default_retry_base(),
        }
    }
}

/// HTTP trigger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the HTTP trigger server is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number.
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Crawler configuration.
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Microblog post channel.
    #[serde(default)]
    pub post: PostConfig,
    /// Push-notification broadcast channel.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Live stream watcher.
    #[serde(default)]
    pub live: LiveConfig,
    /// Scheduled reminders.
    #[serde(default)]
    pub reminder: ReminderConfig,
    /// Task queue worker.
    #[serde(default)]
    pub queue: QueueConfig,
    /// HTTP triggers.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedcastError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedcastError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDCAST_POST_TOKEN`: microblog access token
    /// - `FEEDCAST_POST_DISABLE`: any non-empty value disables posting
    /// - `FEEDCAST_NOTIFY_DISABLE`: any non-empty value disables broadcasting
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("FEEDCAST_POST_TOKEN") {
            if !token.is_empty() {
                self.post.access_token = token;
            }
        }
        if std::env::var("FEEDCAST_POST_DISABLE").is_ok_and(|v| !v.is_empty()) {
            self.post.enabled = false;
        }
        if std::env::var("FEEDCAST_NOTIFY_DISABLE").is_ok_and(|v| !v.is_empty()) {
            self.broadcast.enabled = false;
        }
    }

    /// Parsed crawler timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.crawler.timezone.parse::<Tz>().map_err(|_| {
            FeedcastError::Config(format!("invalid timezone: {}", self.crawler.timezone))
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;

        let mut codes = HashSet::new();
        for source in &self.crawler.sources {
            if !codes.insert(source.code.as_str()) {
                return Err(FeedcastError::Config(format!(
                    "duplicate source code: {}",
                    source.code
                )));
            }
            source.parsed_weekdays()?;
        }

        if self.post.enabled && (self.post.api_url.is_empty() || self.post.access_token.is_empty())
        {
            return Err(FeedcastError::Config(
                "posting is enabled but post.api_url or post.access_token is not set. \
                 Set them in config.toml or via FEEDCAST_POST_TOKEN, or disable posting."
                    .to_string(),
            ));
        }

        if self.broadcast.max_concurrent_sends == 0 {
            return Err(FeedcastError::Config(
                "broadcast.max_concurrent_sends must be at least 1".to_string(),
            ));
        }

        if self.live.enabled && self.live.status_url.is_empty() {
            return Err(FeedcastError::Config(
                "live watcher is enabled but live.status_url is not set".to_string(),
            ));
        }

        if self.reminder.enabled && !(1..=60).contains(&self.reminder.interval_secs) {
            return Err(FeedcastError::Config(
                "reminder.interval_secs must be between 1 and 60".to_string(),
            ));
        }

        if self.queue.max_attempts == 0 || self.queue.concurrency == 0 {
            return Err(FeedcastError::Config(
                "queue.max_attempts and queue.concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
