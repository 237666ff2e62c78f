//! Op code handlers
//!
//! Handles incoming frames based on their operation code.

mod error;
mod heartbeat;
mod router;

pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use router::EventRouter;

use crate::connection::{Connection, Session};
use crate::events::ClientEvent;
use crate::protocol::{CloseCode, GatewayMessage, OpCode};
use crate::server::GatewayState;

/// Dispatch incoming client frames to the appropriate handler
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one inbound frame. Returns a close code when the connection
    /// must be closed.
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Connection,
        message: GatewayMessage,
    ) -> Option<CloseCode> {
        match message.op {
            OpCode::Heartbeat => {
                HeartbeatHandler::handle(state.services(), connection).await;
                None
            }
            OpCode::Event => {
                Self::handle_event(state, connection, message).await;
                None
            }
            op => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    op = %op,
                    "Received server-only op code from client"
                );
                Some(CloseCode::UnknownOpcode)
            }
        }
    }

    async fn handle_event(state: &GatewayState, connection: &Connection, message: GatewayMessage) {
        let name = message.t.clone().unwrap_or_default();
        let session = Session::new(connection.session_id(), connection.user_id());

        let result = match message.t {
            None => Err(HandlerError::MissingEventName),
            Some(name) => match ClientEvent::parse(&name, message.d) {
                Ok(event) => {
                    EventRouter::new(state.services(), state.connections())
                        .route(&session, event)
                        .await
                }
                Err(e) => Err(e),
            },
        };

        let frame = match result {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(e) => {
                if matches!(&e, HandlerError::Service(s) if s.is_server_error()) {
                    tracing::warn!(session_id = %session.session_id, event = %name, error = %e, "Event failed");
                } else {
                    tracing::debug!(session_id = %session.session_id, event = %name, error = %e, "Event rejected");
                }
                e.to_dispatch(&name)
            }
        };

        if let Err(e) = connection.send(frame) {
            tracing::debug!(session_id = %session.session_id, error = %e, "Reply dropped");
        }
    }
}
