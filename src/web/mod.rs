//! HTTP trigger surface.
//!
//! External schedulers (cron, a cloud scheduler) drive the pipeline through
//! these endpoints:
//!
//! - `GET /health`
//! - `POST /cron/crawl`: one crawl run
//! - `POST /cron/live`: one live status poll
//! - `POST /cron/reminder`: queue broadcasts for reminders due this minute
//! - `POST /queue/drain`: process due tasks
//! - `POST /subscribers`: register a notification token
//!
//! Any unrecoverable step answers 500 with a JSON error body.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
