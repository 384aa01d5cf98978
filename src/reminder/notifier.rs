//! Reminder notifier.
//!
//! A reminder is due when its time falls in the current minute as observed in
//! the configured timezone. Each due reminder queues one broadcast task.

use std::sync::Arc;

use chrono_tz::Tz;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::repository::{Reminder, ReminderRepository};
use crate::datetime::{format_in_timezone, Clock};
use crate::db::Database;
use crate::deadline::run_until;
use crate::notify::{BroadcastMessage, BroadcastTask};
use crate::queue::{Channel, Task, TaskQueue};
use crate::Result;

const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Queues broadcasts for due reminders.
pub struct ReminderNotifier {
    db: Database,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl ReminderNotifier {
    /// Create a notifier.
    pub fn new(db: Database, queue: Arc<dyn TaskQueue>, clock: Arc<dyn Clock>, timezone: Tz) -> Self {
        Self {
            db,
            queue,
            clock,
            timezone,
        }
    }

    /// Queue a broadcast for every reminder due this minute, finishing
    /// before `deadline`. Returns the number of broadcasts queued.
    pub async fn notify_due(&self, deadline: Instant) -> Result<usize> {
        run_until(deadline, "reminder check", self.queue_due()).await
    }

    async fn queue_due(&self) -> Result<usize> {
        let minute = format_in_timezone(&self.clock.now(), self.timezone, MINUTE_FORMAT);
        let repo = ReminderRepository::new(self.db.pool());

        let due: Vec<Reminder> = repo
            .list_enabled()
            .await?
            .into_iter()
            .filter(|reminder| {
                format_in_timezone(&reminder.remind_at, self.timezone, MINUTE_FORMAT) == minute
            })
            .collect();
        if due.is_empty() {
            debug!("No reminders due at {}", minute);
            return Ok(0);
        }

        let mut claimed = Vec::with_capacity(due.len());
        let mut tasks = Vec::with_capacity(due.len());
        for reminder in due {
            if !repo.mark_notified(&reminder.id, &minute).await? {
                debug!("Reminder {} already queued for {}", reminder.id, minute);
                continue;
            }
            tasks.push(Task::new(
                Channel::Broadcast,
                &BroadcastTask {
                    messages: vec![BroadcastMessage::new(reminder.text.clone(), None)],
                },
            )?);
            claimed.push(reminder.id);
        }

        if tasks.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.queue.push_multi(tasks).await {
            warn!("Failed to queue reminders for {}: {}", minute, e);
            for id in &claimed {
                repo.clear_notified(id, &minute).await?;
            }
            return Err(e);
        }

        info!("Queued {} reminder(s) for {}", claimed.len(), minute);
        Ok(claimed.len())
    }
}
