//! Image resolution for broadcasts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use super::types::ImageData;
use crate::http::{build_client, read_limited, validate_url};
use crate::{FeedcastError, Result};

/// Turns an image URL into bytes.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Resolve `url`.
    async fn resolve(&self, url: &str) -> Result<ImageData>;
}

/// Downloads images over HTTP with a size limit.
pub struct HttpImageResolver {
    client: Client,
    max_bytes: u64,
}

impl HttpImageResolver {
    /// Create a resolver.
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            max_bytes,
        })
    }
}

/// Last path segment of `url`, or `image` when there is none.
fn file_name_of(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("image")
        .to_string()
}

#[async_trait]
impl ImageResolver for HttpImageResolver {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        validate_url(url)?;
        let parsed =
            url::Url::parse(url).map_err(|e| FeedcastError::Fetch(format!("invalid URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedcastError::Fetch(format!("failed to fetch image: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedcastError::Fetch(format!(
                "HTTP error fetching image: {}",
                response.status()
            )));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = read_limited(response, self.max_bytes).await?;
        let content_type = declared.unwrap_or_else(|| {
            mime_guess::from_path(parsed.path())
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        debug!("Resolved image {} ({} bytes, {})", url, bytes.len(), content_type);
        Ok(ImageData {
            url: url.to_string(),
            file_name: file_name_of(&parsed),
            content_type,
            bytes,
        })
    }
}
