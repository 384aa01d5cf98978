//! Microblog API clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::types::PostRequest;
use crate::config::PostConfig;
use crate::http::build_client;
use crate::{FeedcastError, Result};

/// Publishes posts.
#[async_trait]
pub trait PostClient: Send + Sync {
    /// Publish `request`, optionally as a reply to `in_reply_to`.
    ///
    /// Returns the id of the created post.
    async fn post(&self, request: &PostRequest, in_reply_to: Option<&str>) -> Result<String>;
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "no_media")]
    media_urls: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to_id: Option<&'a str>,
}

fn no_media(urls: &&[String]) -> bool {
    urls.is_empty()
}

/// Client for a JSON status endpoint authenticated with a bearer token.
///
/// The endpoint accepts `{status, media_urls, video_url, in_reply_to_id}` and
/// answers with a JSON object carrying the new post's `id`.
pub struct HttpPostClient {
    client: Client,
    api_url: String,
    access_token: String,
}

impl HttpPostClient {
    /// Create a client from configuration.
    pub fn new(config: &PostConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_secs))?,
            api_url: config.api_url.clone(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl PostClient for HttpPostClient {
    async fn post(&self, request: &PostRequest, in_reply_to: Option<&str>) -> Result<String> {
        let body = StatusBody {
            status: &request.text,
            media_urls: &request.image_urls,
            video_url: request.video_url.as_deref(),
            in_reply_to_id: in_reply_to,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedcastError::Delivery(format!("post request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedcastError::Delivery(format!(
                "post rejected: HTTP {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FeedcastError::Delivery(format!("invalid post response: {}", e)))?;

        let id = post_id(&value)
            .ok_or_else(|| FeedcastError::Delivery("post response has no id".to_string()))?;
        debug!("Created post {}", id);
        Ok(id)
    }
}

fn post_id(value: &serde_json::Value) -> Option<String> {
    match value.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client used when posting is disabled: logs and discards every request.
#[derive(Debug, Default)]
pub struct DisabledPostClient {
    next_id: AtomicU64,
}

impl DisabledPostClient {
    /// Create a disabled client.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostClient for DisabledPostClient {
    async fn post(&self, request: &PostRequest, _in_reply_to: Option<&str>) -> Result<String> {
        info!("Posting disabled, skipping: {:?}", request.text);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(format!("disabled-{}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_id() {
        assert_eq!(post_id(&json!({"id": "123"})), Some("123".to_string()));
        assert_eq!(post_id(&json!({"id": 456})), Some("456".to_string()));
        assert_eq!(post_id(&json!({"id": ""})), None);
        assert_eq!(post_id(&json!({"ok": true})), None);
    }

    #[test]
    fn test_status_body_skips_empty_fields() {
        let body = StatusBody {
            status: "hello",
            media_urls: &[],
            video_url: None,
            in_reply_to_id: None,
        };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"status": "hello"}));

        let images = vec!["https://img.example.com/a.jpg".to_string()];
        let body = StatusBody {
            status: "",
            media_urls: &images,
            video_url: None,
            in_reply_to_id: Some("42"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["in_reply_to_id"], "42");
        assert_eq!(value["media_urls"][0], "https://img.example.com/a.jpg");
    }

    #[tokio::test]
    async fn test_disabled_client_returns_ids() {
        let client = DisabledPostClient::new();
        let first = client.post(&PostRequest::text("a"), None).await.unwrap();
        let second = client.post(&PostRequest::text("b"), Some(first.as_str())).await.unwrap();
        assert_ne!(first, second);
    }
}
