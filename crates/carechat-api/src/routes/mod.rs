//! Route definitions
//!
//! All API routes organized by resource and mounted under /api/v1.

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers::{conversations, directory, health, messages};
use crate::state::AppState;

/// Create the main API router (health is kept apart to bypass rate limiting)
pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Health check routes (exported separately to bypass rate limiting)
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
        .merge(directory_routes())
}

fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/:id/messages", get(conversations::get_messages))
        .route("/conversations/:id/participants", get(conversations::get_participants))
        .route("/conversations/:id/stats", get(conversations::get_stats))
        .route("/conversations/:id/read", patch(conversations::mark_read))
        .route("/conversations/:id/mute", patch(conversations::toggle_mute))
        .route("/conversations/:id/pin", patch(conversations::toggle_pin))
        .route("/unread-count", get(conversations::unread_count))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/:id", delete(messages::delete_message))
        .route("/messages/:id/status", patch(messages::update_status))
        .route("/messages/:id/edit", patch(messages::edit_message))
        .route(
            "/messages/:id/reactions",
            post(messages::add_reaction).delete(messages::remove_reaction),
        )
}

fn directory_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(directory::search_users))
        .route("/providers", get(directory::list_providers))
}
