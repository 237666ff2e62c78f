//! Request DTOs for API endpoints and gateway events
//!
//! All request DTOs implement `Deserialize` and `Validate`. Bodies are
//! camelCase; ids may be sent as strings or numbers.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use carechat_core::{Attachment, MessageStatus, MessageType, Snowflake};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

// ============================================================================
// Message Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: Snowflake,

    #[validate(
        length(min = 1, max = 4000, message = "Content must be 1-4000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,

    #[serde(default)]
    pub message_type: MessageType,

    pub reply_to: Option<Snowflake>,

    pub attachment: Option<Attachment>,
}

/// Content rules are checked by the service after the sender and window
/// checks, so this body carries no validation attributes
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: MessageStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 32, message = "Emoji must be 1-32 characters"))]
    pub emoji: String,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// History cursor; `limit` is clamped by the service
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(custom(function = "not_blank"))]
    #[serde(default)]
    pub query: String,

    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProvidersQuery {
    pub role: Option<String>,
}
