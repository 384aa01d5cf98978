//! Router configuration for the trigger endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    check_reminders, drain_queue, poll_live, register_subscriber, run_crawl, AppState,
};

/// Create the trigger router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cron_routes = Router::new()
        .route("/crawl", post(run_crawl))
        .route("/live", post(poll_live))
        .route("/reminder", post(check_reminders));

    Router::new()
        .nest("/cron", cron_routes)
        .route("/queue/drain", post(drain_queue))
        .route("/subscribers", post(register_subscriber))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
        .merge(create_health_router())
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
