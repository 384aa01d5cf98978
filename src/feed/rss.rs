//! RSS/Atom feed fetcher.
//!
//! Fetches a source's feed over HTTP with URL validation and a body size
//! limit, then turns entries into [`FeedItem`]s. Image and video URLs are
//! taken from the entry's media objects (`media:content`, enclosures) and
//! fall back to media thumbnails.

use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::{Entry, MediaObject};
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::fetcher::FeedFetcher;
use super::types::{FeedItem, FeedSource};
use crate::http::{build_client, read_limited, validate_url};
use crate::{FeedcastError, Result};

/// Default maximum feed size (5 MiB).
pub const DEFAULT_MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// Fetcher for RSS and Atom feeds.
pub struct RssFetcher {
    client: Client,
    max_feed_size: u64,
}

impl RssFetcher {
    /// Create a fetcher whose HTTP client gives up after `timeout`.
    pub fn new(timeout: Duration, max_feed_size: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            max_feed_size,
        })
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, source: &FeedSource, since_url: Option<&str>) -> Result<Vec<FeedItem>> {
        validate_url(&source.url)?;

        let response = self
            .client
            .get(&source.url)
            .timeout(source.timeout)
            .send()
            .await
            .map_err(|e| FeedcastError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedcastError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let bytes = read_limited(response, self.max_feed_size).await?;
        let items = parse_items(&bytes, source, since_url)?;
        debug!("Fetched {} new items from {}", items.len(), source.code);
        Ok(items)
    }
}

/// Parse feed bytes into the items newer than `since_url`.
///
/// Entries are expected newest first. Parsing stops at the entry whose URL
/// equals `since_url` and at most `source.max_items` items are returned.
pub fn parse_items(
    bytes: &[u8],
    source: &FeedSource,
    since_url: Option<&str>,
) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedcastError::Fetch(format!("failed to parse feed: {}", e)))?;

    let title = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| source.code.clone());
    let site_url = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| feed.links.first())
        .map(|l| l.href.clone())
        .unwrap_or_else(|| source.url.clone());

    let mut items = Vec::new();
    for entry in feed.entries {
        if items.len() >= source.max_items {
            break;
        }

        let Some(entry_url) = entry_link(&entry) else {
            debug!("Skipping entry without a link in {}", source.code);
            continue;
        };
        if since_url.is_some_and(|since| since == entry_url) {
            break;
        }

        let (images, videos) = media_urls(&entry.media);
        let mut item = FeedItem::new(
            source.code.clone(),
            title.clone(),
            site_url.clone(),
            entry.title.map(|t| t.content).unwrap_or_default(),
            entry_url,
        )
        .with_images(images)
        .with_videos(videos);
        if let Some(published_at) = entry.published.or(entry.updated) {
            item = item.with_published_at(published_at);
        }

        items.push(item);
    }

    Ok(items)
}

fn entry_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

#[derive(Debug, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
    Other,
}

fn media_kind(declared: Option<&str>, url: &url::Url) -> MediaKind {
    let top_level = match declared {
        Some(kind) => kind.split('/').next().unwrap_or_default().to_string(),
        None => mime_guess::from_path(url.path())
            .first()
            .map(|m| m.type_().as_str().to_string())
            .unwrap_or_default(),
    };

    match top_level.as_str() {
        "image" => MediaKind::Image,
        "video" => MediaKind::Video,
        _ => MediaKind::Other,
    }
}

fn media_urls(media: &[MediaObject]) -> (Vec<String>, Vec<String>) {
    let mut images = Vec::new();
    let mut videos = Vec::new();

    for object in media {
        for content in &object.content {
            let Some(url) = &content.url else {
                continue;
            };
            let declared = content.content_type.as_ref().map(|m| m.essence().to_string());
            match media_kind(declared.as_deref(), url) {
                MediaKind::Image => images.push(url.to_string()),
                MediaKind::Video => videos.push(url.to_string()),
                MediaKind::Other => {}
            }
        }
    }

    if images.is_empty() {
        images = media
            .iter()
            .flat_map(|object| object.thumbnails.iter())
            .map(|thumbnail| thumbnail.image.uri.clone())
            .collect();
    }

    (dedup_preserving_order(images), dedup_preserving_order(videos))
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
