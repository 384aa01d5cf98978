//! Broadcast engine.
//!
//! Sends one message to every subscriber with at most `max_concurrent_sends`
//! sends in flight. Each recipient is independent: a slow or failing send
//! never blocks or fails another, and a recipient whose token the provider
//! rejects is removed.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::image::ImageResolver;
use super::sender::{NotificationSender, SendError};
use super::subscriber::SubscriberRepository;
use super::types::{BroadcastReport, ImageData, Subscriber};
use crate::deadline::run_until;
use crate::{FeedcastError, Result};

#[derive(Debug, PartialEq, Eq)]
enum SendOutcome {
    Delivered,
    Revoked,
    Failed,
}

impl BroadcastReport {
    fn record(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Delivered => self.delivered += 1,
            SendOutcome::Revoked => self.revoked += 1,
            SendOutcome::Failed => self.failed += 1,
        }
    }
}

/// Delivers broadcasts to all subscribers.
pub struct BroadcastEngine {
    subscribers: SubscriberRepository,
    sender: Arc<dyn NotificationSender>,
    images: Arc<dyn ImageResolver>,
    max_concurrent_sends: usize,
    enabled: bool,
}

impl BroadcastEngine {
    /// Create an enabled engine.
    pub fn new(
        subscribers: SubscriberRepository,
        sender: Arc<dyn NotificationSender>,
        images: Arc<dyn ImageResolver>,
        max_concurrent_sends: usize,
    ) -> Self {
        Self {
            subscribers,
            sender,
            images,
            max_concurrent_sends: max_concurrent_sends.max(1),
            enabled: true,
        }
    }

    /// Enable or disable delivery.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Broadcast `message` to every subscriber, with the image at
    /// `image_url` attached when given.
    ///
    /// Fails only when the message is empty, the subscriber list cannot be
    /// loaded or the image cannot be resolved. Per-recipient failures are
    /// counted in the report.
    pub async fn broadcast(
        &self,
        message: &str,
        image_url: Option<&str>,
        deadline: Instant,
    ) -> Result<BroadcastReport> {
        if message.trim().is_empty() && image_url.is_none() {
            return Err(FeedcastError::Validation(
                "broadcast message must not be empty".to_string(),
            ));
        }

        if !self.enabled {
            info!("Broadcast disabled, skipping message");
            return Ok(BroadcastReport::default());
        }

        let subscribers = self.subscribers.list_all().await?;
        let image = match image_url {
            Some(url) => Some(Arc::new(
                run_until(deadline, "resolving image", self.images.resolve(url)).await?,
            )),
            None => None,
        };

        let mut report = BroadcastReport {
            total: subscribers.len(),
            ..BroadcastReport::default()
        };
        if subscribers.is_empty() {
            debug!("No subscribers, nothing to broadcast");
            return Ok(report);
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrent_sends));
        let message: Arc<str> = Arc::from(message);
        let mut sends = JoinSet::new();

        for subscriber in subscribers {
            let permit = match limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Send limiter closed: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let sender = self.sender.clone();
            let repository = self.subscribers.clone();
            let message = message.clone();
            let image = image.clone();

            sends.spawn(async move {
                let _permit = permit;
                deliver(
                    &subscriber,
                    sender.as_ref(),
                    &repository,
                    &message,
                    image.as_deref(),
                    deadline,
                )
                .await
            });
        }

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("Send task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Broadcast finished: {}/{} delivered, {} revoked, {} failed",
            report.delivered, report.total, report.revoked, report.failed
        );
        Ok(report)
    }
}

async fn deliver(
    subscriber: &Subscriber,
    sender: &dyn NotificationSender,
    repository: &SubscriberRepository,
    message: &str,
    image: Option<&ImageData>,
    deadline: Instant,
) -> SendOutcome {
    let token = match subscriber.credential() {
        Ok(token) => token,
        Err(e) => {
            error!("Cannot send to {}: {}", subscriber.id, e);
            return SendOutcome::Failed;
        }
    };

    if Instant::now() >= deadline {
        warn!("Deadline passed before sending to {}", subscriber.id);
        return SendOutcome::Failed;
    }

    match tokio::time::timeout_at(deadline, sender.send(token, message, image)).await {
        Ok(Ok(())) => SendOutcome::Delivered,
        Ok(Err(SendError::InvalidToken)) => {
            match repository.delete(&subscriber.id).await {
                Ok(_) => {
                    info!("Removed subscriber {} (invalid token)", subscriber.id);
                    SendOutcome::Revoked
                }
                Err(e) => {
                    error!("Failed to remove subscriber {}: {}", subscriber.id, e);
                    SendOutcome::Failed
                }
            }
        }
        Ok(Err(e)) => {
            warn!("Send to {} failed: {}", subscriber.id, e);
            SendOutcome::Failed
        }
        Err(_) => {
            warn!("Send to {} exceeded the deadline", subscriber.id);
            SendOutcome::Failed
        }
    }
}
