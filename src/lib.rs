//! feedcast - feed crawler and notification fan-out
//!
//! Crawls RSS/Atom sources on a schedule, deduplicates new entries per
//! delivery channel, and delivers them through a durable task queue to a
//! microblog (post channel) and to push-notification subscribers
//! (broadcast channel). A live stream watcher announces offline to live
//! transitions, and due reminders, through the same queue.

pub mod app;
pub mod config;
pub mod crawl;
pub mod datetime;
pub mod db;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod http;
pub mod live;
pub mod logging;
pub mod notify;
pub mod post;
pub mod queue;
pub mod reminder;
pub mod scheduler;
pub mod web;

pub use app::App;
pub use config::Config;
pub use crawl::{CrawlReport, CrawlService};
pub use db::Database;
pub use error::{FeedcastError, Result};
