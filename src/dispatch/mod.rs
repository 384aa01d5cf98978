//! Dedup and enqueue of crawled items.
//!
//! Each channel has an [`EnqueueStage`] that records the item in the
//! idempotency table, converts it with the [`Converter`] and pushes one task.

mod convert;
mod enqueue;
mod idempotency;

pub use convert::{truncate, Converter, MAX_TITLE_CHARS};
pub use enqueue::EnqueueStage;
pub use idempotency::{idempotency_key, IdempotencyRepository};
