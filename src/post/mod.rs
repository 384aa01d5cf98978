//! Microblog post channel.

mod client;
mod handler;
mod types;

pub use client::{DisabledPostClient, HttpPostClient, PostClient};
pub use handler::PostHandler;
pub use types::{PostRequest, PostTask, MAX_IMAGES_PER_POST};
