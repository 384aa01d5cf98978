//! Trigger endpoint handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::error::ApiError;
use crate::crawl::{CrawlReport, CrawlService};
use crate::live::{LiveWatcher, Transition};
use crate::notify::SubscriberRepository;
use crate::queue::{DrainReport, QueueWorker};
use crate::reminder::ReminderNotifier;

/// Shared state of the trigger endpoints.
pub struct AppState {
    /// Crawl run.
    pub crawl: Arc<CrawlService>,
    /// Queue worker.
    pub worker: Arc<QueueWorker>,
    /// Live watcher, when enabled.
    pub live: Option<Arc<LiveWatcher>>,
    /// Deadline of one live poll.
    pub live_deadline: Duration,
    /// Reminder notifier, when enabled.
    pub reminders: Option<Arc<ReminderNotifier>>,
    /// Deadline of one reminder check.
    pub reminder_deadline: Duration,
    /// Subscriber registry.
    pub subscribers: SubscriberRepository,
}

/// Live poll response.
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    /// What the poll did.
    pub transition: Transition,
}

/// Reminder check response.
#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    /// Broadcasts queued by this check.
    pub queued: usize,
}

/// Subscriber registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Notification access token.
    pub token: String,
}

/// Subscriber registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// Subscriber id.
    pub id: String,
}

/// POST /cron/crawl
pub async fn run_crawl(State(state): State<Arc<AppState>>) -> Result<Json<CrawlReport>, ApiError> {
    let report = state.crawl.run().await?;
    Ok(Json(report))
}

/// POST /cron/live
pub async fn poll_live(State(state): State<Arc<AppState>>) -> Result<Json<LiveResponse>, ApiError> {
    let watcher = state
        .live
        .as_ref()
        .ok_or_else(|| ApiError::not_found("live watcher is disabled"))?;

    let transition = watcher.poll(Instant::now() + state.live_deadline).await?;
    Ok(Json(LiveResponse { transition }))
}

/// POST /cron/reminder
pub async fn check_reminders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let notifier = state
        .reminders
        .as_ref()
        .ok_or_else(|| ApiError::not_found("reminders are disabled"))?;

    let queued = notifier
        .notify_due(Instant::now() + state.reminder_deadline)
        .await?;
    Ok(Json(ReminderResponse { queued }))
}

/// POST /queue/drain
pub async fn drain_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DrainReport>, ApiError> {
    let report = state.worker.drain().await?;
    Ok(Json(report))
}

/// POST /subscribers
pub async fn register_subscriber(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let subscriber = state.subscribers.save(&request.token).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { id: subscriber.id }),
    ))
}
