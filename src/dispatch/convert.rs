//! Conversion of crawled items into channel requests.

use crate::feed::FeedItem;
use crate::http::is_absolute_http_url;
use crate::notify::BroadcastMessage;
use crate::post::{PostRequest, MAX_IMAGES_PER_POST};

/// Maximum characters of the title part of a post.
pub const MAX_TITLE_CHARS: usize = 77;

const ELLIPSIS: &str = "...";

/// Truncate `text` to `max_chars` characters, ending in `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Builds post requests and broadcast messages from feed items.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    hashtags: String,
}

impl Converter {
    /// Create a converter appending `hashtags` to every post.
    pub fn new(hashtags: impl Into<String>) -> Self {
        Self {
            hashtags: hashtags.into().trim().to_string(),
        }
    }

    fn headline(item: &FeedItem) -> String {
        format!("{} {}", item.title.trim(), item.entry_title.trim())
            .trim()
            .to_string()
    }

    /// Post requests for `item`: the primary first, then the follow-ups.
    ///
    /// Images are split into batches of [`MAX_IMAGES_PER_POST`]; the first
    /// batch goes with the primary. Videos follow the image batches, except
    /// that a post without images carries the first video itself. Returns
    /// nothing for an item without an absolute http(s) entry URL.
    pub fn post_requests(&self, item: &FeedItem) -> Vec<PostRequest> {
        if !is_absolute_http_url(&item.entry_url) {
            return vec![];
        }

        let mut text = format!(
            "{} {}",
            truncate(&Self::headline(item), MAX_TITLE_CHARS),
            item.entry_url
        );
        if !self.hashtags.is_empty() {
            text.push(' ');
            text.push_str(&self.hashtags);
        }

        let mut batches = item.image_urls.chunks(MAX_IMAGES_PER_POST);
        let mut primary = PostRequest::text(text);
        let mut videos = item.video_urls.iter();

        match batches.next() {
            Some(batch) => primary.image_urls = batch.to_vec(),
            None => primary.video_url = videos.next().cloned(),
        }

        let mut requests = vec![primary];
        requests.extend(batches.map(|batch| PostRequest {
            image_urls: batch.to_vec(),
            ..PostRequest::default()
        }));
        requests.extend(videos.map(|video| PostRequest {
            video_url: Some(video.clone()),
            ..PostRequest::default()
        }));

        requests
    }

    /// Broadcast messages for `item`.
    ///
    /// The first message carries the headline and the first image; each
    /// further image goes out as its own message. Returns nothing for an
    /// item without an absolute http(s) entry URL.
    pub fn broadcast_messages(&self, item: &FeedItem) -> Vec<BroadcastMessage> {
        if !is_absolute_http_url(&item.entry_url) {
            return vec![];
        }

        let text = format!(
            "\n{}\n{}\n{}",
            item.title.trim(),
            item.entry_title.trim(),
            item.entry_url
        );

        let mut images = item.image_urls.iter();
        let mut messages = vec![BroadcastMessage::new(text, images.next().cloned())];
        messages.extend(images.map(|image| BroadcastMessage::new(" ", Some(image.clone()))));

        messages
    }
}
