//! Feed types for feedcast.

use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::{CrawlerConfig, SourceConfig};
use crate::Result;

/// A crawled entry.
///
/// Produced once by a fetcher and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Code of the source this item was crawled from.
    pub source: String,
    /// Title of the containing feed or site.
    pub title: String,
    /// URL of the containing feed or site.
    pub url: String,
    /// Title of the entry.
    pub entry_title: String,
    /// Canonical URL of the entry.
    pub entry_url: String,
    /// When the entry was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Image URLs in document order.
    pub image_urls: Vec<String>,
    /// Video URLs in document order.
    pub video_urls: Vec<String>,
}

impl FeedItem {
    /// Create a new item without media.
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        entry_title: impl Into<String>,
        entry_url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            url: url.into(),
            entry_title: entry_title.into(),
            entry_url: entry_url.into(),
            published_at: None,
            image_urls: vec![],
            video_urls: vec![],
        }
    }

    /// Set the publish time.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the image URLs.
    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Set the video URLs.
    pub fn with_videos<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.video_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}

/// A configured source, resolved against crawler defaults.
#[derive(Debug, Clone)]
pub struct FeedSource {
    /// Source code.
    pub code: String,
    /// Feed URL.
    pub url: String,
    /// Maximum items taken per crawl.
    pub max_items: usize,
    /// Fetch timeout.
    pub timeout: Duration,
    /// Weekdays the source is crawled on; empty = every day.
    pub weekdays: Vec<Weekday>,
}

impl FeedSource {
    /// Create a source crawled every day.
    pub fn new(code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
            max_items: 10,
            timeout: Duration::from_secs(30),
            weekdays: vec![],
        }
    }

    /// Resolve a configured source against the crawler defaults.
    pub fn from_config(source: &SourceConfig, crawler: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            code: source.code.clone(),
            url: source.url.clone(),
            max_items: source.max_items.unwrap_or(crawler.max_items),
            timeout: Duration::from_secs(source.timeout_secs.unwrap_or(crawler.fetch_timeout_secs)),
            weekdays: source.parsed_weekdays()?,
        })
    }

    /// Set the maximum items.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restrict the source to the given weekdays.
    pub fn with_weekdays(mut self, weekdays: Vec<Weekday>) -> Self {
        self.weekdays = weekdays;
        self
    }

    /// Whether the source is crawled on `weekday`.
    pub fn is_scheduled_on(&self, weekday: Weekday) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&weekday)
    }
}

/// Newest entry already seen for a source.
#[derive(Debug, Clone)]
pub struct LatestEntry {
    /// Source code.
    pub code: String,
    /// Entry URL.
    pub url: String,
    /// When the marker was last moved.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_item_builder() {
        let item = FeedItem::new(
            "blog",
            "Blog",
            "https://blog.example.com",
            "Hello",
            "https://blog.example.com/1",
        )
        .with_images(["https://img.example.com/a.jpg", "https://img.example.com/b.jpg"])
        .with_videos(vec!["https://video.example.com/v.mp4".to_string()]);

        assert_eq!(item.source, "blog");
        assert_eq!(item.image_urls.len(), 2);
        assert_eq!(item.image_urls[0], "https://img.example.com/a.jpg");
        assert_eq!(item.video_urls, vec!["https://video.example.com/v.mp4"]);
        assert!(item.published_at.is_none());
    }

    #[test]
    fn test_source_from_config_uses_defaults() {
        let crawler = CrawlerConfig::default();
        let config = SourceConfig {
            code: "news".to_string(),
            url: "https://news.example.com/rss".to_string(),
            max_items: None,
            timeout_secs: Some(5),
            weekdays: vec!["Sun".to_string()],
        };

        let source = FeedSource::from_config(&config, &crawler).unwrap();
        assert_eq!(source.max_items, crawler.max_items);
        assert_eq!(source.timeout, Duration::from_secs(5));
        assert!(source.is_scheduled_on(Weekday::Sun));
        assert!(!source.is_scheduled_on(Weekday::Mon));
    }

    #[test]
    fn test_source_without_weekdays_runs_daily() {
        let source = FeedSource::new("blog", "https://blog.example.com/feed");
        assert!(source.is_scheduled_on(Weekday::Mon));
        assert!(source.is_scheduled_on(Weekday::Sun));
    }
}
