//! Post channel types.

use serde::{Deserialize, Serialize};

/// Maximum images attached to one post request.
pub const MAX_IMAGES_PER_POST: usize = 4;

/// One request to the microblog API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    /// Status text; empty for follow-ups.
    pub text: String,
    /// Attached image URLs, at most [`MAX_IMAGES_PER_POST`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Attached video URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl PostRequest {
    /// Text-only request.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Payload of a post task.
///
/// The first request is the primary post; every further request is posted
/// as a reply to the one before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTask {
    /// Requests in posting order.
    pub requests: Vec<PostRequest>,
}
