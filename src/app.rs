//! Application wiring.
//!
//! Builds every component from [`Config`] and runs the background loops and
//! the optional trigger server until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::crawl::CrawlService;
use crate::datetime::{Clock, SystemClock};
use crate::db::Database;
use crate::dispatch::{Converter, EnqueueStage};
use crate::feed::{CrawlDispatcher, FeedFetcher, FeedSource, RssFetcher, SourceRegistry};
use crate::live::{HttpLiveStatusChecker, LiveWatcher, StreamInfo};
use crate::notify::{
    BroadcastEngine, BroadcastHandler, HttpImageResolver, HttpNotifySender, SubscriberRepository,
};
use crate::post::{DisabledPostClient, HttpPostClient, PostClient, PostHandler};
use crate::queue::{Channel, QueueWorker, SqliteTaskQueue, TaskQueue};
use crate::reminder::ReminderNotifier;
use crate::scheduler::{LivePollJob, ReminderJob, Scheduler};
use crate::web::{AppState, WebServer};
use crate::Result;

/// The assembled application.
pub struct App {
    config: Config,
    crawl: Arc<CrawlService>,
    worker: Arc<QueueWorker>,
    live: Option<Arc<LiveWatcher>>,
    reminders: Option<Arc<ReminderNotifier>>,
    subscribers: SubscriberRepository,
}

impl App {
    /// Open the database and build every component from `config`.
    pub async fn build(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database.path).await?;
        Self::with_database(config, db)
    }

    /// Build every component over an already opened database.
    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timezone = config.timezone()?;

        let queue = SqliteTaskQueue::new(db.clone(), clock.clone());
        let task_queue: Arc<dyn TaskQueue> = Arc::new(queue.clone());

        // Crawl pipeline
        let rss: Arc<dyn FeedFetcher> = Arc::new(RssFetcher::new(
            Duration::from_secs(config.crawler.fetch_timeout_secs),
            config.crawler.max_feed_size_bytes,
        )?);
        let mut registry = SourceRegistry::new();
        let mut sources = Vec::with_capacity(config.crawler.sources.len());
        for source in &config.crawler.sources {
            registry.register(source.code.clone(), rss.clone());
            sources.push(FeedSource::from_config(source, &config.crawler)?);
        }
        let dispatcher = CrawlDispatcher::new(registry, sources, clock.clone(), timezone);

        let converter = Arc::new(Converter::new(config.post.hashtags.clone()));
        let stages = Channel::ALL
            .into_iter()
            .map(|channel| {
                EnqueueStage::new(
                    channel,
                    db.clone(),
                    task_queue.clone(),
                    converter.clone(),
                    config.database.transaction_attempts,
                )
            })
            .collect();
        let crawl = Arc::new(CrawlService::new(
            db.clone(),
            dispatcher,
            stages,
            Duration::from_secs(config.crawler.deadline_secs),
        ));

        // Delivery
        let post_client: Arc<dyn PostClient> = if config.post.enabled {
            Arc::new(HttpPostClient::new(&config.post)?)
        } else {
            warn!("Posting is disabled");
            Arc::new(DisabledPostClient::new())
        };

        let subscribers = SubscriberRepository::new(db.pool().clone());
        if !config.broadcast.enabled {
            warn!("Broadcasting is disabled");
        }
        let engine = BroadcastEngine::new(
            subscribers.clone(),
            Arc::new(HttpNotifySender::new(&config.broadcast)?),
            Arc::new(HttpImageResolver::new(
                Duration::from_secs(config.broadcast.timeout_secs),
                config.broadcast.max_image_bytes,
            )?),
            config.broadcast.max_concurrent_sends,
        )
        .with_enabled(config.broadcast.enabled);

        let worker = Arc::new(
            QueueWorker::new(queue, &config.queue)
                .with_handler(Channel::Post, Arc::new(PostHandler::new(post_client)))
                .with_handler(
                    Channel::Broadcast,
                    Arc::new(BroadcastHandler::new(Arc::new(engine))),
                ),
        );

        // Live watcher
        let live = if config.live.enabled {
            let checker = HttpLiveStatusChecker::new(
                &config.live.status_url,
                &config.live.status_pointer,
                Duration::from_secs(config.live.deadline_secs),
            )?;
            Some(Arc::new(LiveWatcher::new(
                db.clone(),
                Arc::new(checker),
                task_queue.clone(),
                clock.clone(),
                StreamInfo::from(&config.live),
                timezone,
            )))
        } else {
            None
        };

        // Reminders
        let reminders = config
            .reminder
            .enabled
            .then(|| Arc::new(ReminderNotifier::new(db.clone(), task_queue, clock, timezone)));

        Ok(Self {
            config,
            crawl,
            worker,
            live,
            reminders,
            subscribers,
        })
    }

    /// State for the trigger endpoints.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            crawl: self.crawl.clone(),
            worker: self.worker.clone(),
            live: self.live.clone(),
            live_deadline: Duration::from_secs(self.config.live.deadline_secs),
            reminders: self.reminders.clone(),
            reminder_deadline: Duration::from_secs(self.config.reminder.deadline_secs),
            subscribers: self.subscribers.clone(),
        })
    }

    /// Run the background loops and the trigger server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let mut scheduler = Scheduler::new();

        if self.config.crawler.enabled {
            scheduler.spawn(
                self.crawl.clone(),
                Duration::from_secs(self.config.crawler.interval_secs),
            );
        } else {
            info!("Crawler loop disabled");
        }

        scheduler.spawn(
            self.worker.clone(),
            Duration::from_secs(self.config.queue.poll_interval_secs),
        );

        if let Some(watcher) = &self.live {
            scheduler.spawn(
                Arc::new(LivePollJob::new(
                    watcher.clone(),
                    Duration::from_secs(self.config.live.deadline_secs),
                )),
                Duration::from_secs(self.config.live.interval_secs),
            );
        }

        if let Some(notifier) = &self.reminders {
            scheduler.spawn(
                Arc::new(ReminderJob::new(
                    notifier.clone(),
                    Duration::from_secs(self.config.reminder.deadline_secs),
                )),
                Duration::from_secs(self.config.reminder.interval_secs),
            );
        }

        let server = if self.config.web.enabled {
            let server = WebServer::new(&self.config.web, self.app_state())?;
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!("Web server error: {}", e);
                }
            }))
        } else {
            None
        };

        info!("feedcast running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");

        scheduler.shutdown();
        if let Some(server) = server {
            server.abort();
        }
        Ok(())
    }
}
