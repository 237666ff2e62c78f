//! In-process fan-out for a gateway mounted next to the REST API

use crate::connection::ConnectionManager;
use async_trait::async_trait;
use carechat_core::{ChatEvent, EventNotifier, Snowflake};
use std::sync::Arc;

/// [`EventNotifier`] that writes straight into this instance's connections
#[derive(Debug, Clone)]
pub struct LocalNotifier {
    connections: Arc<ConnectionManager>,
}

impl LocalNotifier {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl EventNotifier for LocalNotifier {
    async fn notify(&self, recipients: &[Snowflake], event: ChatEvent) {
        for user_id in recipients {
            self.connections.deliver(*user_id, &event).await;
        }
    }

    async fn broadcast(&self, event: ChatEvent, except: Option<Snowflake>) {
        self.connections.deliver_all(&event, except);
    }
}
