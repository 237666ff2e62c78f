//! Conversation handlers
//!
//! Listing, history, participants, stats and the per-user flags.

use axum::extract::State;
use carechat_service::dto::{
    ConversationStats, ConversationSummary, HistoryPage, HistoryQuery, MuteState, PinState,
    ReadReceipt, UnreadSummary, UserPresence,
};
use carechat_service::{ConversationService, MessagingService};

use crate::extractors::{AuthUser, IdPath, ValidatedQuery};
use crate::response::{ApiJson, ApiResult};
use crate::state::AppState;

/// List the caller's conversations, most recent activity first
///
/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ApiJson<Vec<ConversationSummary>>> {
    let conversations = ConversationService::new(state.services())
        .list_conversations(auth.user_id)
        .await?;
    Ok(ApiJson(conversations))
}

/// One page of history; also marks the conversation read
///
/// GET /conversations/{id}/messages
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
    ValidatedQuery(query): ValidatedQuery<HistoryQuery>,
) -> ApiResult<ApiJson<HistoryPage>> {
    let page = MessagingService::new(state.services())
        .get_history(conversation_id, auth.user_id, query)
        .await?;
    Ok(ApiJson(page))
}

/// GET /conversations/{id}/participants
pub async fn get_participants(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
) -> ApiResult<ApiJson<Vec<UserPresence>>> {
    let participants = ConversationService::new(state.services())
        .participants(conversation_id, auth.user_id)
        .await?;
    Ok(ApiJson(participants))
}

/// GET /conversations/{id}/stats
pub async fn get_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
) -> ApiResult<ApiJson<ConversationStats>> {
    let stats = ConversationService::new(state.services())
        .conversation_stats(conversation_id, auth.user_id)
        .await?;
    Ok(ApiJson(stats))
}

/// Mark everything addressed to the caller as read
///
/// PATCH /conversations/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
) -> ApiResult<ApiJson<ReadReceipt>> {
    let receipt = MessagingService::new(state.services())
        .mark_conversation_read(conversation_id, auth.user_id)
        .await?;
    Ok(ApiJson(receipt))
}

/// PATCH /conversations/{id}/mute
pub async fn toggle_mute(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
) -> ApiResult<ApiJson<MuteState>> {
    let muted = ConversationService::new(state.services())
        .toggle_mute(conversation_id, auth.user_id)
        .await?;
    Ok(ApiJson(muted))
}

/// PATCH /conversations/{id}/pin
pub async fn toggle_pin(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(conversation_id): IdPath,
) -> ApiResult<ApiJson<PinState>> {
    let pinned = ConversationService::new(state.services())
        .toggle_pin(conversation_id, auth.user_id)
        .await?;
    Ok(ApiJson(pinned))
}

/// Total unread plus a per-conversation breakdown
///
/// GET /unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ApiJson<UnreadSummary>> {
    let summary = ConversationService::new(state.services())
        .unread_summary(auth.user_id)
        .await?;
    Ok(ApiJson(summary))
}
