//! Post task handler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use super::client::PostClient;
use super::types::PostTask;
use crate::deadline::run_until;
use crate::queue::{Task, TaskHandler};
use crate::{FeedcastError, Result};

/// Publishes the requests of a post task as a thread.
///
/// A failed primary post fails the task so the queue retries it. Once the
/// primary is published, failed follow-ups are logged and skipped; the
/// thread continues from the last successful post.
pub struct PostHandler {
    client: Arc<dyn PostClient>,
}

impl PostHandler {
    /// Create a handler posting through `client`.
    pub fn new(client: Arc<dyn PostClient>) -> Self {
        Self { client }
    }

    /// Publish every request of `payload`.
    ///
    /// Returns the ids of the posts created.
    pub async fn publish(&self, payload: &PostTask, deadline: Instant) -> Result<Vec<String>> {
        let mut requests = payload.requests.iter();
        let Some(primary) = requests.next() else {
            return Err(FeedcastError::Validation("post task has no requests".to_string()));
        };

        let primary_id = run_until(deadline, "primary post", self.client.post(primary, None)).await?;
        info!("Posted {}", primary_id);

        let mut ids = vec![primary_id];
        for (index, followup) in requests.enumerate() {
            let Some(previous) = ids.last().cloned() else {
                break;
            };
            let reply = self.client.post(followup, Some(previous.as_str()));
            match run_until(deadline, "follow-up post", reply).await {
                Ok(id) => ids.push(id),
                Err(e) => warn!("Follow-up post {} failed: {}", index + 1, e),
            }
        }

        Ok(ids)
    }
}

#[async_trait]
impl TaskHandler for PostHandler {
    async fn handle(&self, task: &Task, deadline: Instant) -> Result<()> {
        let payload: PostTask = task.decode()?;
        self.publish(&payload, deadline).await?;
        Ok(())
    }
}
