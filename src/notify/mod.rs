//! Push-notification broadcast channel.
//!
//! - [`SubscriberRepository`]: registered recipient tokens
//! - [`NotificationSender`]: sends one message to one recipient
//! - [`ImageResolver`]: turns an image URL into bytes
//! - [`BroadcastEngine`]: bounded-concurrency fan-out to all recipients
//! - [`BroadcastHandler`]: queue handler for broadcast tasks

mod broadcast;
mod handler;
mod image;
mod sender;
mod subscriber;
mod types;

pub use broadcast::BroadcastEngine;
pub use handler::BroadcastHandler;
pub use image::{HttpImageResolver, ImageResolver};
pub use sender::{HttpNotifySender, NotificationSender, SendError};
pub use subscriber::{subscriber_id, SubscriberRepository};
pub use types::{BroadcastMessage, BroadcastReport, BroadcastTask, ImageData, Subscriber};
