//! Scheduled reminders broadcast to every subscriber.

mod notifier;
mod repository;

pub use notifier::ReminderNotifier;
pub use repository::{Reminder, ReminderRepository};
