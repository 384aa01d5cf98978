//! Notification senders.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::types::ImageData;
use crate::config::BroadcastConfig;
use crate::http::build_client;
use crate::Result;

/// Failure of a single send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The provider rejected the token permanently.
    #[error("invalid access token")]
    InvalidToken,

    /// The provider answered with an error status.
    #[error("rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The request could not be completed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Delivers one notification to one recipient.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send `text`, with `image` attached when present, using `token`.
    async fn send(
        &self,
        token: &str,
        text: &str,
        image: Option<&ImageData>,
    ) -> std::result::Result<(), SendError>;
}

/// Sender for a bearer-token notify API taking a multipart form with a
/// `message` field and an optional `imageFile` upload.
///
/// HTTP 401 is reported as [`SendError::InvalidToken`].
pub struct HttpNotifySender {
    client: Client,
    api_url: String,
}

impl HttpNotifySender {
    /// Create a sender from configuration.
    pub fn new(config: &BroadcastConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_secs))?,
            api_url: config.api_url.clone(),
        })
    }
}

fn build_form(text: &str, image: Option<&ImageData>) -> std::result::Result<Form, SendError> {
    let form = Form::new().text("message", text.to_string());
    let Some(image) = image else {
        return Ok(form);
    };

    let part = Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| SendError::Transport(format!("invalid image type: {}", e)))?;
    Ok(form.part("imageFile", part))
}

#[async_trait]
impl NotificationSender for HttpNotifySender {
    async fn send(
        &self,
        token: &str,
        text: &str,
        image: Option<&ImageData>,
    ) -> std::result::Result<(), SendError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .multipart(build_form(text, image)?)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SendError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let image = ImageData {
            url: "https://img.example.com/a.jpg".to_string(),
            file_name: "a.jpg".to_string(),
            content_type: "not a mime".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert!(matches!(
            build_form("hello", Some(&image)),
            Err(SendError::Transport(_))
        ));
    }

    #[test]
    fn test_build_form_text_only() {
        assert!(build_form("hello", None).is_ok());
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::Rejected {
            status: 500,
            message: "oops".to_string(),
        };
        assert_eq!(err.to_string(), "rejected with HTTP 500: oops");
        assert_eq!(SendError::InvalidToken.to_string(), "invalid access token");
    }
}
