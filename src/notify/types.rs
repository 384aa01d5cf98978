//! Broadcast channel types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FeedcastError, Result};

/// One notification sent to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Message text.
    pub text: String,
    /// Image attached to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BroadcastMessage {
    /// Create a message.
    pub fn new(text: impl Into<String>, image_url: Option<String>) -> Self {
        Self {
            text: text.into(),
            image_url,
        }
    }
}

/// Payload of a broadcast task; messages are broadcast in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTask {
    /// Messages in delivery order.
    pub messages: Vec<BroadcastMessage>,
}

/// A registered push-notification recipient.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// SHA-256 of the token.
    pub id: String,
    /// Access token.
    pub token: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    /// The subscriber's current credential.
    pub fn credential(&self) -> Result<&str> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(FeedcastError::Validation(format!(
                "subscriber {} has no token",
                self.id
            )));
        }
        Ok(token)
    }
}

/// Resolved image bytes shared across the sends of one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Source URL.
    pub url: String,
    /// File name used for the upload.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// Per-recipient outcome of one broadcast.
///
/// `delivered + revoked + failed == total` always holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Sends that succeeded.
    pub delivered: usize,
    /// Subscribers removed after an invalid-token response.
    pub revoked: usize,
    /// Sends that failed or ran past the deadline.
    pub failed: usize,
    /// Subscribers targeted.
    pub total: usize,
}
