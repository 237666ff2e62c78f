//! Message handlers
//!
//! Endpoints for sending, acknowledging, editing, reacting to and deleting
//! messages.

use axum::extract::State;
use carechat_service::dto::{
    EditMessageRequest, MessageResponse, ReactionRequest, ReactionUpdate, SendMessageRequest,
    SentMessage, UpdateStatusRequest,
};
use carechat_service::MessagingService;

use crate::extractors::{AuthUser, IdPath, ValidatedJson};
use crate::response::{ApiJson, ApiResult, Created, NoContent};
use crate::state::AppState;

/// Send a message, creating the conversation on first contact
///
/// POST /messages
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> ApiResult<Created<ApiJson<SentMessage>>> {
    let sent = MessagingService::new(state.services())
        .send_message(auth.user_id, request)
        .await?;
    Ok(Created(ApiJson(sent)))
}

/// Recipient acknowledges delivery or reading
///
/// PATCH /messages/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(message_id): IdPath,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<ApiJson<MessageResponse>> {
    let message = MessagingService::new(state.services())
        .update_status(message_id, auth.user_id, request.status)
        .await?;
    Ok(ApiJson(message))
}

/// PATCH /messages/{id}/edit
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(message_id): IdPath,
    ValidatedJson(request): ValidatedJson<EditMessageRequest>,
) -> ApiResult<ApiJson<MessageResponse>> {
    let message = MessagingService::new(state.services())
        .edit_message(message_id, auth.user_id, request.content)
        .await?;
    Ok(ApiJson(message))
}

/// Set the caller's reaction, replacing any previous one
///
/// POST /messages/{id}/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(message_id): IdPath,
    ValidatedJson(request): ValidatedJson<ReactionRequest>,
) -> ApiResult<ApiJson<ReactionUpdate>> {
    let update = MessagingService::new(state.services())
        .add_reaction(message_id, auth.user_id, &request.emoji)
        .await?;
    Ok(ApiJson(update))
}

/// DELETE /messages/{id}/reactions
pub async fn remove_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(message_id): IdPath,
) -> ApiResult<ApiJson<ReactionUpdate>> {
    let update = MessagingService::new(state.services())
        .remove_reaction(message_id, auth.user_id)
        .await?;
    Ok(ApiJson(update))
}

/// Permanent delete, sender only
///
/// DELETE /messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(message_id): IdPath,
) -> ApiResult<NoContent> {
    MessagingService::new(state.services())
        .delete_message(message_id, auth.user_id)
        .await?;
    Ok(NoContent)
}
