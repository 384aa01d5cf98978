//! Feed fetcher capability and the source registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{FeedItem, FeedSource};
use crate::Result;

/// Something that can crawl one source.
///
/// `since_url` is the newest entry URL seen on the previous crawl; a fetcher
/// returns only entries newer than it, at most `source.max_items` of them,
/// newest first.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch new items for `source`.
    async fn fetch(&self, source: &FeedSource, since_url: Option<&str>) -> Result<Vec<FeedItem>>;
}

/// Maps source codes to the fetcher that crawls them.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    fetchers: HashMap<String, Arc<dyn FeedFetcher>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fetcher` for `code`, replacing any previous registration.
    pub fn register(&mut self, code: impl Into<String>, fetcher: Arc<dyn FeedFetcher>) {
        self.fetchers.insert(code.into(), fetcher);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, code: impl Into<String>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        self.register(code, fetcher);
        self
    }

    /// Fetcher registered for `code`.
    pub fn get(&self, code: &str) -> Option<Arc<dyn FeedFetcher>> {
        self.fetchers.get(code).cloned()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<&String> = self.fetchers.keys().collect();
        codes.sort();
        f.debug_struct("SourceRegistry").field("codes", &codes).finish()
    }
}
