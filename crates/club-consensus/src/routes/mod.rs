//! Route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{delete_requests, health, history, live};
use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(channel_routes())
        .merge(delete_request_routes())
}

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}

/// History, read flag and the live stream
fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/channel/:channel_id/messages", get(history::get_messages))
        .route("/channel/:channel_id/read", post(history::mark_read))
        .route("/ws/channel/:channel_id", get(live::live_handler))
}

/// Delete-request consensus
fn delete_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/channel/:channel_id/delete-request",
            post(delete_requests::create_delete_request),
        )
        .route(
            "/channel/:channel_id/delete-request",
            get(delete_requests::get_active_delete_request),
        )
        .route(
            "/delete-request/:delete_request_id/vote",
            post(delete_requests::vote),
        )
}
