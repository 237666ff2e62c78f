//! Handler error types
//!
//! None of these close the socket; they are reported back to the
//! originating connection as an `error` dispatch.

use carechat_core::ChatEventKind;
use carechat_service::ServiceError;
use serde_json::json;
use thiserror::Error;

use crate::protocol::GatewayMessage;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Event frame without a name")]
    MissingEventName,

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid {event} payload: {reason}")]
    InvalidPayload { event: String, reason: String },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl HandlerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEventName | Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::Service(e) => e.error_code(),
        }
    }

    /// Client-facing message; server faults are not described
    pub fn message(&self) -> String {
        match self {
            Self::Service(e) => e.public_message(),
            other => other.to_string(),
        }
    }

    /// `error` dispatch naming the event that failed
    pub fn to_dispatch(&self, event: &str) -> GatewayMessage {
        GatewayMessage::dispatch(
            ChatEventKind::Error.as_str(),
            json!({
                "event": event,
                "code": self.code(),
                "message": self.message(),
            }),
        )
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
