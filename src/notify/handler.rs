//! Broadcast task handler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, warn};

use super::broadcast::BroadcastEngine;
use super::types::{BroadcastReport, BroadcastTask};
use crate::queue::{Task, TaskHandler};
use crate::{FeedcastError, Result};

/// Broadcasts the messages of a broadcast task in order.
///
/// A message that cannot be broadcast at all (subscribers unreadable, image
/// unresolvable) is logged and the remaining messages still go out. The task
/// fails, and is retried, only when no message could be broadcast.
pub struct BroadcastHandler {
    engine: Arc<BroadcastEngine>,
}

impl BroadcastHandler {
    /// Create a handler over `engine`.
    pub fn new(engine: Arc<BroadcastEngine>) -> Self {
        Self { engine }
    }

    /// Broadcast every message of `payload`, returning one report per
    /// message that went out.
    pub async fn deliver(
        &self,
        payload: &BroadcastTask,
        deadline: Instant,
    ) -> Result<Vec<BroadcastReport>> {
        if payload.messages.is_empty() {
            return Err(FeedcastError::Validation(
                "broadcast task has no messages".to_string(),
            ));
        }

        let mut reports = Vec::with_capacity(payload.messages.len());
        let mut last_error = None;

        for (index, message) in payload.messages.iter().enumerate() {
            match self
                .engine
                .broadcast(&message.text, message.image_url.as_deref(), deadline)
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Broadcast of message {} failed: {}", index, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if reports.is_empty() => {
                error!("No message of the broadcast task could be sent");
                Err(e)
            }
            _ => Ok(reports),
        }
    }
}

#[async_trait]
impl TaskHandler for BroadcastHandler {
    async fn handle(&self, task: &Task, deadline: Instant) -> Result<()> {
        let payload: BroadcastTask = task.decode()?;
        self.deliver(&payload, deadline).await?;
        Ok(())
    }
}
