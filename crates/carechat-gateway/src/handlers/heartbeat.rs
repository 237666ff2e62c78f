//! Heartbeat handler (op 1)

use carechat_service::{PresenceService, ServiceContext};

use crate::connection::Connection;
use crate::protocol::GatewayMessage;

pub struct HeartbeatHandler;

impl HeartbeatHandler {
    pub async fn handle(services: &ServiceContext, connection: &Connection) {
        connection.record_heartbeat().await;

        tracing::trace!(
            session_id = %connection.session_id(),
            server_seq = connection.current_sequence(),
            "Heartbeat received"
        );

        if let Err(e) = connection.send(GatewayMessage::heartbeat_ack()) {
            tracing::debug!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to queue heartbeat ACK"
            );
        }

        if let Err(e) = PresenceService::new(services)
            .heartbeat(connection.user_id(), connection.session_id())
            .await
        {
            tracing::debug!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to refresh presence"
            );
        }
    }
}
