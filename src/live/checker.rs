//! Live status checkers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::http::{build_client, validate_url};
use crate::{FeedcastError, Result};

/// Reports whether the watched stream is live.
#[async_trait]
pub trait LiveStatusChecker: Send + Sync {
    /// Current live state.
    async fn is_live(&self) -> Result<bool>;
}

/// Reads a boolean from a JSON status endpoint at a JSON pointer.
pub struct HttpLiveStatusChecker {
    client: Client,
    status_url: String,
    pointer: String,
}

impl HttpLiveStatusChecker {
    /// Create a checker reading `pointer` (e.g. `/channel/is_live`) from
    /// the document at `status_url`.
    pub fn new(status_url: &str, pointer: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            status_url: status_url.to_string(),
            pointer: pointer.to_string(),
        })
    }
}

/// Interpret the value at `pointer` in `document` as a live flag.
///
/// Accepts booleans, numbers (non-zero = live) and the strings
/// `"true"`/`"live"`.
pub fn live_flag(document: &Value, pointer: &str) -> Result<bool> {
    let value = document
        .pointer(pointer)
        .ok_or_else(|| FeedcastError::Fetch(format!("status has no value at {}", pointer)))?;

    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Ok(matches!(s.to_lowercase().as_str(), "true" | "live")),
        Value::Null => Ok(false),
        other => Err(FeedcastError::Fetch(format!(
            "status value at {} is not a flag: {}",
            pointer, other
        ))),
    }
}

#[async_trait]
impl LiveStatusChecker for HttpLiveStatusChecker {
    async fn is_live(&self) -> Result<bool> {
        validate_url(&self.status_url)?;

        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .map_err(|e| FeedcastError::Fetch(format!("failed to fetch live status: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedcastError::Fetch(format!(
                "HTTP error fetching live status: {}",
                response.status()
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| FeedcastError::Fetch(format!("invalid live status: {}", e)))?;

        live_flag(&document, &self.pointer)
    }
}
