//! Gateway frame format

use super::{CloseCode, HelloPayload, OpCode};
use carechat_core::ChatEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every frame on the socket, in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Event name (Dispatch and Event only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Per-connection sequence, stamped by the connection's writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

/// Why an inbound frame could not be accepted
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown op code: {0}")]
    UnknownOpcode(u64),
}

impl FrameError {
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::Decode(_) => CloseCode::DecodeError,
            Self::UnknownOpcode(_) => CloseCode::UnknownOpcode,
        }
    }
}

/// Inbound frames are read with a raw op so an unknown opcode is told apart
/// from broken JSON
#[derive(Deserialize)]
struct RawFrame {
    op: u64,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Option<Value>,
}

impl GatewayMessage {
    /// Dispatch frame (op=0); the sequence is filled in on the way out
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_name.into()),
            s: None,
            d: Some(data),
        }
    }

    #[must_use]
    pub fn from_event(event: &ChatEvent) -> Self {
        Self::dispatch(event.kind.as_str(), event.payload.clone())
    }

    #[must_use]
    pub fn hello(payload: &HelloPayload) -> Self {
        Self {
            op: OpCode::Hello,
            t: None,
            s: None,
            d: serde_json::to_value(payload).ok(),
        }
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck,
            t: None,
            s: None,
            d: None,
        }
    }

    /// Client event frame (op=2)
    #[must_use]
    pub fn event(event_name: impl Into<String>, data: Value) -> Self {
        Self {
            op: OpCode::Event,
            t: Some(event_name.into()),
            s: None,
            d: Some(data),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an inbound text frame
    pub fn parse(json: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(json)?;
        let op = u8::try_from(raw.op)
            .ok()
            .and_then(OpCode::from_u8)
            .ok_or(FrameError::UnknownOpcode(raw.op))?;
        Ok(Self {
            op,
            t: raw.t,
            s: None,
            d: raw.d,
        })
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "GatewayMessage(op={}, t={t}, s={s})", self.op),
            (Some(t), None) => write!(f, "GatewayMessage(op={}, t={t})", self.op),
            _ => write!(f, "GatewayMessage(op={})", self.op),
        }
    }
}
