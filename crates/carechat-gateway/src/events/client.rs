//! Events a client sends with op=2
//!
//! A frame's `t` names the event and `d` carries its camelCase payload.

use carechat_core::{ChatEventKind, Snowflake};
use carechat_service::dto::SendMessageRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::handlers::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: Snowflake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: Snowflake,
}

/// `message_read` marks a whole conversation or a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTarget {
    pub conversation_id: Option<Snowflake>,
    pub message_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    pub message_id: Snowflake,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub message_id: Snowflake,
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSignalKind {
    Request,
    Accept,
    Reject,
    End,
}

impl CallSignalKind {
    /// Event the counterpart receives
    pub fn outbound(self) -> ChatEventKind {
        match self {
            Self::Request => ChatEventKind::IncomingCall,
            Self::Accept => ChatEventKind::CallAccepted,
            Self::Reject => ChatEventKind::CallRejected,
            Self::End => ChatEventKind::CallEnded,
        }
    }
}

/// Call signaling is relayed as-is; only the conversation is inspected
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignal {
    pub kind: CallSignalKind,
    pub conversation_id: Snowflake,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    TypingStart(ConversationRef),
    TypingStop(ConversationRef),
    MessageRead(ReadTarget),
    MessageDelivered(MessageRef),
    SendMessage(SendMessageRequest),
    EditMessage(EditPayload),
    AddReaction(ReactionPayload),
    RemoveReaction(MessageRef),
    DeleteMessage(MessageRef),
    ToggleMute(ConversationRef),
    TogglePin(ConversationRef),
    UserAway,
    UserBack,
    Call(CallSignal),
}

impl ClientEvent {
    pub fn parse(name: &str, data: Option<Value>) -> Result<Self, HandlerError> {
        let data = data.unwrap_or(Value::Null);
        let event = match name {
            "join_conversation" => Self::JoinConversation(payload(name, data)?),
            "leave_conversation" => Self::LeaveConversation(payload(name, data)?),
            "typing_start" => Self::TypingStart(payload(name, data)?),
            "typing_stop" => Self::TypingStop(payload(name, data)?),
            "message_read" => Self::MessageRead(payload(name, data)?),
            "message_delivered" => Self::MessageDelivered(payload(name, data)?),
            "send_message" => Self::SendMessage(payload(name, data)?),
            "edit_message" => Self::EditMessage(payload(name, data)?),
            "add_reaction" => Self::AddReaction(payload(name, data)?),
            "remove_reaction" => Self::RemoveReaction(payload(name, data)?),
            "delete_message" => Self::DeleteMessage(payload(name, data)?),
            "toggle_mute" => Self::ToggleMute(payload(name, data)?),
            "toggle_pin" => Self::TogglePin(payload(name, data)?),
            "user_away" => Self::UserAway,
            "user_back" => Self::UserBack,
            "call_request" => Self::call(CallSignalKind::Request, name, data)?,
            "call_accept" => Self::call(CallSignalKind::Accept, name, data)?,
            "call_reject" => Self::call(CallSignalKind::Reject, name, data)?,
            "call_end" => Self::call(CallSignalKind::End, name, data)?,
            other => return Err(HandlerError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    fn call(kind: CallSignalKind, name: &str, data: Value) -> Result<Self, HandlerError> {
        let target: ConversationRef = payload(name, data.clone())?;
        Ok(Self::Call(CallSignal {
            kind,
            conversation_id: target.conversation_id,
            payload: data,
        }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
            Self::MessageRead(_) => "message_read",
            Self::MessageDelivered(_) => "message_delivered",
            Self::SendMessage(_) => "send_message",
            Self::EditMessage(_) => "edit_message",
            Self::AddReaction(_) => "add_reaction",
            Self::RemoveReaction(_) => "remove_reaction",
            Self::DeleteMessage(_) => "delete_message",
            Self::ToggleMute(_) => "toggle_mute",
            Self::TogglePin(_) => "toggle_pin",
            Self::UserAway => "user_away",
            Self::UserBack => "user_back",
            Self::Call(signal) => match signal.kind {
                CallSignalKind::Request => "call_request",
                CallSignalKind::Accept => "call_accept",
                CallSignalKind::Reject => "call_reject",
                CallSignalKind::End => "call_end",
            },
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, HandlerError> {
    serde_json::from_value(data).map_err(|e| HandlerError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_conversation_events() {
        let event = ClientEvent::parse("join_conversation", Some(json!({"conversationId": "42"}))).unwrap();
        assert!(matches!(
            event,
            ClientEvent::JoinConversation(ConversationRef { conversation_id }) if conversation_id == Snowflake::new(42)
        ));
        assert_eq!(event.name(), "join_conversation");
    }

    #[test]
    fn test_parse_send_message_defaults_type() {
        let event = ClientEvent::parse(
            "send_message",
            Some(json!({"recipientId": "7", "content": "hi"})),
        )
        .unwrap();
        let ClientEvent::SendMessage(request) = event else {
            panic!("expected send_message");
        };
        assert_eq!(request.recipient_id, Snowflake::new(7));
        assert_eq!(request.message_type, carechat_core::MessageType::Text);
    }

    #[test]
    fn test_unit_events_ignore_payload() {
        assert!(matches!(ClientEvent::parse("user_away", None), Ok(ClientEvent::UserAway)));
        assert!(matches!(
            ClientEvent::parse("user_back", Some(json!({}))),
            Ok(ClientEvent::UserBack)
        ));
    }

    #[test]
    fn test_call_keeps_whole_payload() {
        let data = json!({"conversationId": "5", "sdp": "v=0", "video": true});
        let event = ClientEvent::parse("call_request", Some(data.clone())).unwrap();
        let ClientEvent::Call(signal) = event else {
            panic!("expected call");
        };
        assert_eq!(signal.kind.outbound(), ChatEventKind::IncomingCall);
        assert_eq!(signal.conversation_id, Snowflake::new(5));
        assert_eq!(signal.payload, data);
    }

    #[test]
    fn test_parse_errors() {
        let err = ClientEvent::parse("summon_dragon", None).unwrap_err();
        assert!(matches!(err, HandlerError::UnknownEvent(ref name) if name == "summon_dragon"));

        let err = ClientEvent::parse("add_reaction", Some(json!({"messageId": "1"}))).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload { ref event, .. } if event == "add_reaction"));

        assert!(ClientEvent::parse("typing_start", None).is_err());
    }
}
