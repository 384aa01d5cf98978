//! Live stream watching.

mod checker;
mod repository;
mod watcher;

pub use checker::{live_flag, HttpLiveStatusChecker, LiveStatusChecker};
pub use repository::{LiveStatus, LiveStatusRepository, LIVE_STATUS_ID};
pub use watcher::{LiveWatcher, StreamInfo, Transition};
