//! Crawl run.
//!
//! One run crawls the scheduled sources, feeds every new item to each
//! channel's enqueue stage and moves each source's latest-entry marker
//! forward once all of its items are handled.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::deadline::run_until;
use crate::dispatch::EnqueueStage;
use crate::feed::{CrawlDispatcher, FeedItem, LatestEntryRepository};
use crate::{FeedcastError, Result};

/// Counters for one crawl run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Sources crawled successfully.
    pub sources_ok: usize,
    /// Sources that failed or timed out.
    pub sources_failed: usize,
    /// Items fetched.
    pub items: usize,
    /// Tasks queued, across channels.
    pub enqueued: usize,
    /// Item/channel pairs already handled earlier.
    pub skipped: usize,
    /// Item/channel pairs rejected as malformed.
    pub invalid: usize,
}

/// Crawl-and-enqueue service.
pub struct CrawlService {
    db: Database,
    dispatcher: CrawlDispatcher,
    stages: Vec<EnqueueStage>,
    deadline: Duration,
}

impl CrawlService {
    /// Create a service; every item goes through every stage in `stages`.
    pub fn new(
        db: Database,
        dispatcher: CrawlDispatcher,
        stages: Vec<EnqueueStage>,
        deadline: Duration,
    ) -> Self {
        Self {
            db,
            dispatcher,
            stages,
            deadline,
        }
    }

    /// Run once under the configured deadline.
    pub async fn run(&self) -> Result<CrawlReport> {
        self.run_until(Instant::now() + self.deadline).await
    }

    /// Run once, finishing before `deadline`.
    ///
    /// Source failures and malformed items are counted, not returned. A
    /// persistence or queue failure stops that source's marker from moving
    /// and is returned after every item has been tried.
    pub async fn run_until(&self, deadline: Instant) -> Result<CrawlReport> {
        run_until(deadline, "crawl run", self.crawl(deadline)).await
    }

    async fn crawl(&self, deadline: Instant) -> Result<CrawlReport> {
        let latest = LatestEntryRepository::new(self.db.pool());
        let since = latest.all_urls().await?;

        let outcome = self.dispatcher.dispatch(&since, deadline).await;

        let mut report = CrawlReport {
            sources_ok: outcome.succeeded(),
            sources_failed: outcome.failed(),
            ..CrawlReport::default()
        };
        let mut first_error: Option<FeedcastError> = None;

        for source in &outcome.sources {
            let Ok(items) = &source.result else {
                continue;
            };
            report.items += items.len();

            let mut source_ok = true;
            for item in items {
                if let Err(e) = self.enqueue_everywhere(item, &mut report).await {
                    error!("Failed to enqueue {}: {}", item.entry_url, e);
                    source_ok = false;
                    first_error.get_or_insert(e);
                }
            }

            // Items are newest first
            let newest = items.iter().find(|item| !item.entry_url.is_empty());
            if let (true, Some(newest)) = (source_ok, newest) {
                latest.save(&source.code, &newest.entry_url).await?;
            }
        }

        info!(
            "Crawl finished: {} sources ok, {} failed, {} items, {} enqueued, {} skipped, {} invalid",
            report.sources_ok,
            report.sources_failed,
            report.items,
            report.enqueued,
            report.skipped,
            report.invalid
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Enqueue `item` on every stage. Returns the first unrecoverable error
    /// after trying all stages.
    async fn enqueue_everywhere(&self, item: &FeedItem, report: &mut CrawlReport) -> Result<()> {
        let mut first_error = None;

        for stage in &self.stages {
            match stage.enqueue(item).await {
                Ok(true) => report.enqueued += 1,
                Ok(false) => report.skipped += 1,
                Err(FeedcastError::InvalidItem(reason)) => {
                    warn!("Skipping malformed item on {}: {}", stage.channel(), reason);
                    report.invalid += 1;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
