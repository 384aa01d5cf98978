//! Enqueue stage.
//!
//! Turns a crawled item into at most one queued task per channel, however
//! many times and however concurrently the item is enqueued.

use std::sync::Arc;

use tracing::{debug, info};

use super::convert::Converter;
use super::idempotency::{idempotency_key, IdempotencyRepository};
use crate::db::Database;
use crate::feed::FeedItem;
use crate::notify::BroadcastTask;
use crate::post::PostTask;
use crate::queue::{Channel, Task, TaskQueue};
use crate::{FeedcastError, Result};

/// Dedup-and-enqueue stage for one channel.
pub struct EnqueueStage {
    channel: Channel,
    db: Database,
    queue: Arc<dyn TaskQueue>,
    converter: Arc<Converter>,
    transaction_attempts: u32,
}

impl EnqueueStage {
    /// Create a stage for `channel`.
    pub fn new(
        channel: Channel,
        db: Database,
        queue: Arc<dyn TaskQueue>,
        converter: Arc<Converter>,
        transaction_attempts: u32,
    ) -> Self {
        Self {
            channel,
            db,
            queue,
            converter,
            transaction_attempts,
        }
    }

    /// Channel this stage feeds.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Enqueue `item` unless it was already enqueued on this channel.
    ///
    /// Returns `Ok(true)` when a task was queued and `Ok(false)` when the
    /// item had already been handled. The idempotency record is committed
    /// before conversion, so an item that converts to no request fails with
    /// [`FeedcastError::InvalidItem`] once and is a no-op afterwards.
    pub async fn enqueue(&self, item: &FeedItem) -> Result<bool> {
        let key = idempotency_key(&item.entry_url);
        let records = IdempotencyRepository::new(self.db.pool(), self.transaction_attempts);

        if records.exists(self.channel, &key).await? {
            debug!("{} already enqueued on {}", item.entry_url, self.channel);
            return Ok(false);
        }

        if !records.try_mark(self.channel, &key, &item.entry_url).await? {
            debug!("{} enqueued concurrently on {}", item.entry_url, self.channel);
            return Ok(false);
        }

        let task = self.build_task(item)?;
        self.queue.push(task).await?;

        info!("Enqueued {} on {}", item.entry_url, self.channel);
        Ok(true)
    }

    fn build_task(&self, item: &FeedItem) -> Result<Task> {
        let invalid = || {
            FeedcastError::InvalidItem(format!(
                "{} from {} converts to no {} request",
                item.entry_url, item.source, self.channel
            ))
        };

        match self.channel {
            Channel::Post => {
                let requests = self.converter.post_requests(item);
                if requests.is_empty() {
                    return Err(invalid());
                }
                Task::new(Channel::Post, &PostTask { requests })
            }
            Channel::Broadcast => {
                let messages = self.converter.broadcast_messages(item);
                if messages.is_empty() {
                    return Err(invalid());
                }
                Task::new(Channel::Broadcast, &BroadcastTask { messages })
            }
        }
    }
}
