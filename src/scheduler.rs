//! Background loops for feedcast.
//!
//! Each periodic piece of work (crawl run, live poll, reminder check, queue
//! drain) is a [`Job`] run on a fixed interval by the [`Scheduler`]. A failed
//! run is logged and the loop carries on with the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::crawl::CrawlService;
use crate::live::LiveWatcher;
use crate::queue::QueueWorker;
use crate::reminder::ReminderNotifier;
use crate::Result;

/// A unit of periodic work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run once.
    async fn run_once(&self) -> Result<()>;
}

#[async_trait]
impl Job for CrawlService {
    fn name(&self) -> &str {
        "crawl"
    }

    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl Job for QueueWorker {
    fn name(&self) -> &str {
        "queue"
    }

    async fn run_once(&self) -> Result<()> {
        self.drain().await.map(|_| ())
    }
}

/// Live poll with a per-poll deadline.
pub struct LivePollJob {
    watcher: Arc<LiveWatcher>,
    deadline: Duration,
}

impl LivePollJob {
    /// Create a job polling `watcher`, each poll bounded by `deadline`.
    pub fn new(watcher: Arc<LiveWatcher>, deadline: Duration) -> Self {
        Self { watcher, deadline }
    }
}

#[async_trait]
impl Job for LivePollJob {
    fn name(&self) -> &str {
        "live"
    }

    async fn run_once(&self) -> Result<()> {
        self.watcher
            .poll(Instant::now() + self.deadline)
            .await
            .map(|_| ())
    }
}

/// Reminder check with a per-check deadline.
pub struct ReminderJob {
    notifier: Arc<ReminderNotifier>,
    deadline: Duration,
}

impl ReminderJob {
    pub fn new(notifier: Arc<ReminderNotifier>, deadline: Duration) -> Self {
        Self { notifier, deadline }
    }
}

#[async_trait]
impl Job for ReminderJob {
    fn name(&self) -> &str {
        "reminder"
    }

    async fn run_once(&self) -> Result<()> {
        self.notifier
            .notify_due(Instant::now() + self.deadline)
            .await
            .map(|_| ())
    }
}

/// Runs jobs on fixed intervals.
#[derive(Default)]
pub struct Scheduler {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `every`, starting immediately.
    pub fn spawn(&mut self, job: Arc<dyn Job>, every: Duration) {
        let name = job.name().to_string();
        info!("Starting {} loop (interval: {} seconds)", name, every.as_secs());

        let handle = tokio::spawn(async move {
            let mut timer = interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                debug!("Running {}", job.name());
                if let Err(e) = job.run_once().await {
                    error!("{} run failed: {}", job.name(), e);
                }
            }
        });

        self.handles.push((name, handle));
    }

    /// Number of running loops.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no loop is running.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every loop.
    pub fn shutdown(self) {
        for (name, handle) in self.handles {
            debug!("Stopping {} loop", name);
            handle.abort();
        }
    }
}
