//! Feed crawling for feedcast.
//!
//! - [`FeedFetcher`]: crawls one source
//! - [`RssFetcher`]: RSS/Atom implementation over HTTP
//! - [`CrawlDispatcher`]: runs the scheduled sources concurrently
//! - [`LatestEntryRepository`]: newest entry seen per source

mod dispatcher;
mod fetcher;
mod repository;
mod rss;
mod types;

pub use dispatcher::{CrawlDispatcher, CrawlOutcome, SourceOutcome};
pub use fetcher::{FeedFetcher, SourceRegistry};
pub use repository::LatestEntryRepository;
pub use rss::{parse_items, RssFetcher, DEFAULT_MAX_FEED_SIZE};
pub use types::{FeedItem, FeedSource, LatestEntry};
