//! Crawl dispatcher.
//!
//! Runs every source scheduled for today concurrently, each under the
//! earlier of the run deadline and its own fetch timeout. A failing source
//! never affects the others.

use std::collections::HashMap;
use std::sync::Arc;

use chrono_tz::Tz;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::fetcher::SourceRegistry;
use super::types::{FeedItem, FeedSource};
use crate::datetime::{weekday_in, Clock};
use crate::deadline::{earliest, run_until};
use crate::Result;

/// Result of crawling one source.
#[derive(Debug)]
pub struct SourceOutcome {
    /// Source code.
    pub code: String,
    /// Items fetched, or why the source failed.
    pub result: Result<Vec<FeedItem>>,
}

impl SourceOutcome {
    /// Whether the source was crawled successfully.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of one dispatch across all scheduled sources.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Per-source outcomes, in completion order.
    pub sources: Vec<SourceOutcome>,
}

impl CrawlOutcome {
    /// Union of the items of every successful source.
    pub fn items(&self) -> Vec<&FeedItem> {
        self.sources
            .iter()
            .filter_map(|s| s.result.as_ref().ok())
            .flatten()
            .collect()
    }

    /// Number of sources that succeeded.
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.is_ok()).count()
    }

    /// Number of sources that failed.
    pub fn failed(&self) -> usize {
        self.sources.len() - self.succeeded()
    }
}

/// Fans a crawl out over the configured sources.
pub struct CrawlDispatcher {
    registry: SourceRegistry,
    sources: Vec<FeedSource>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl CrawlDispatcher {
    /// Create a dispatcher.
    ///
    /// Sources without a fetcher in `registry` are logged and skipped on
    /// each dispatch.
    pub fn new(
        registry: SourceRegistry,
        sources: Vec<FeedSource>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            registry,
            sources,
            clock,
            timezone,
        }
    }

    /// Configured sources.
    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Sources scheduled for the current weekday.
    pub fn scheduled_sources(&self) -> Vec<&FeedSource> {
        let today = weekday_in(&self.clock.now(), self.timezone);
        self.sources
            .iter()
            .filter(|source| {
                let scheduled = source.is_scheduled_on(today);
                if !scheduled {
                    debug!("Skipping {} (not scheduled on {})", source.code, today);
                }
                scheduled
            })
            .collect()
    }

    /// Crawl every scheduled source until `deadline`.
    ///
    /// `since` maps a source code to the newest entry URL already seen.
    pub async fn dispatch(&self, since: &HashMap<String, String>, deadline: Instant) -> CrawlOutcome {
        let mut tasks = JoinSet::new();
        let mut outcome = CrawlOutcome::default();

        for source in self.scheduled_sources() {
            let Some(fetcher) = self.registry.get(&source.code) else {
                error!("No fetcher registered for source {}, skipping", source.code);
                continue;
            };

            let source = source.clone();
            let since_url = since.get(&source.code).cloned();
            let source_deadline = earliest(deadline, source.timeout);

            tasks.spawn(async move {
                let what = format!("fetching {}", source.code);
                let result = run_until(
                    source_deadline,
                    &what,
                    fetcher.fetch(&source, since_url.as_deref()),
                )
                .await;
                SourceOutcome {
                    code: source.code,
                    result,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(source_outcome) => {
                    match &source_outcome.result {
                        Ok(items) => {
                            info!("Crawled {}: {} new items", source_outcome.code, items.len())
                        }
                        Err(e) => warn!("Failed to crawl {}: {}", source_outcome.code, e),
                    }
                    outcome.sources.push(source_outcome);
                }
                Err(e) => error!("Crawl task panicked: {}", e),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::FixedClock;
    use crate::feed::fetcher::FeedFetcher;
    use crate::FeedcastError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc, Weekday};
    use std::time::Duration;

    struct StaticFetcher(Vec<FeedItem>);

    #[async_trait]
    impl FeedFetcher for StaticFetcher {
        async fn fetch(&self, _: &FeedSource, _: Option<&str>) -> Result<Vec<FeedItem>> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl FeedFetcher for FailingFetcher {
        async fn fetch(&self, _: &FeedSource, _: Option<&str>) -> Result<Vec<FeedItem>> {
            Err(FeedcastError::Fetch("connection refused".to_string()))
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl FeedFetcher for HangingFetcher {
        async fn fetch(&self, _: &FeedSource, _: Option<&str>) -> Result<Vec<FeedItem>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    fn item(source: &str, n: u32) -> FeedItem {
        FeedItem::new(
            source,
            source,
            format!("https://{source}.example.com"),
            format!("entry {n}"),
            format!("https://{source}.example.com/{n}"),
        )
    }

    // 2024-01-14 is a Sunday in Tokyo
    fn sunday_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 14, 3, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_dispatch_isolates_failures() {
        let registry = SourceRegistry::new()
            .with("blog", Arc::new(StaticFetcher(vec![item("blog", 1), item("blog", 2)])))
            .with("news", Arc::new(FailingFetcher));
        let sources = vec![
            FeedSource::new("blog", "https://blog.example.com/feed"),
            FeedSource::new("news", "https://news.example.com/feed"),
        ];
        let dispatcher =
            CrawlDispatcher::new(registry, sources, sunday_clock(), chrono_tz::Asia::Tokyo);

        let outcome = dispatcher
            .dispatch(&HashMap::new(), Instant::now() + Duration::from_secs(5))
            .await;

        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.items().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_skips_unscheduled_sources() {
        let registry = SourceRegistry::new()
            .with("daily", Arc::new(StaticFetcher(vec![item("daily", 1)])))
            .with("weekly", Arc::new(StaticFetcher(vec![item("weekly", 1)])))
            .with("monday", Arc::new(StaticFetcher(vec![item("monday", 1)])));
        let sources = vec![
            FeedSource::new("daily", "https://daily.example.com/feed"),
            FeedSource::new("weekly", "https://weekly.example.com/feed")
                .with_weekdays(vec![Weekday::Sun]),
            FeedSource::new("monday", "https://monday.example.com/feed")
                .with_weekdays(vec![Weekday::Mon]),
        ];
        let dispatcher =
            CrawlDispatcher::new(registry, sources, sunday_clock(), chrono_tz::Asia::Tokyo);

        let outcome = dispatcher
            .dispatch(&HashMap::new(), Instant::now() + Duration::from_secs(5))
            .await;

        let mut codes: Vec<&str> = outcome.sources.iter().map(|s| s.code.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["daily", "weekly"]);
    }

    #[tokio::test]
    async fn test_dispatch_skips_source_without_fetcher() {
        let dispatcher = CrawlDispatcher::new(
            SourceRegistry::new(),
            vec![FeedSource::new("ghost", "https://ghost.example.com/feed")],
            sunday_clock(),
            chrono_tz::Asia::Tokyo,
        );

        let outcome = dispatcher
            .dispatch(&HashMap::new(), Instant::now() + Duration::from_secs(5))
            .await;

        assert!(outcome.sources.is_empty());
        assert!(outcome.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_times_out_slow_source() {
        let registry = SourceRegistry::new()
            .with("slow", Arc::new(HangingFetcher))
            .with("fast", Arc::new(StaticFetcher(vec![item("fast", 1)])));
        let sources = vec![
            FeedSource::new("slow", "https://slow.example.com/feed")
                .with_timeout(Duration::from_secs(2)),
            FeedSource::new("fast", "https://fast.example.com/feed"),
        ];
        let dispatcher =
            CrawlDispatcher::new(registry, sources, sunday_clock(), chrono_tz::Asia::Tokyo);

        let outcome = dispatcher
            .dispatch(&HashMap::new(), Instant::now() + Duration::from_secs(30))
            .await;

        let slow = outcome.sources.iter().find(|s| s.code == "slow").unwrap();
        assert!(matches!(&slow.result, Err(e) if e.is_deadline_exceeded()));
        assert_eq!(outcome.items().len(), 1);
    }
}
