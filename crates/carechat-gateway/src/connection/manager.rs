//! Connection manager
//!
//! Tracks every live connection on this instance using DashMap for
//! concurrent access, and turns chat events into dispatch frames for the
//! connections that should see them.

use super::{Connection, Outbound};
use crate::protocol::GatewayMessage;
use carechat_core::{ChatEvent, Snowflake};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct ConnectionManager {
    /// Active connections by session ID
    connections: DashMap<String, Arc<Connection>>,

    /// User ID to session IDs mapping
    user_connections: DashMap<Snowflake, HashSet<String>>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_connections: DashMap::new(),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection. The flag is true when it is the user's first
    /// connection on this instance.
    pub fn add_connection(
        &self,
        session_id: String,
        user_id: Snowflake,
        sender: mpsc::Sender<Outbound>,
    ) -> (Arc<Connection>, bool) {
        let connection = Connection::new(session_id.clone(), user_id, sender);
        self.connections.insert(session_id.clone(), connection.clone());

        let first = {
            let mut sessions = self.user_connections.entry(user_id).or_default();
            sessions.insert(session_id.clone());
            sessions.len() == 1
        };

        tracing::debug!(session_id = %session_id, user_id = %user_id, "Connection added");
        (connection, first)
    }

    /// Remove a connection. The flag is true when the user has no connection
    /// left on this instance.
    pub fn remove_connection(&self, session_id: &str) -> Option<(Arc<Connection>, bool)> {
        let (_, connection) = self.connections.remove(session_id)?;
        let user_id = connection.user_id();

        if let Some(mut sessions) = self.user_connections.get_mut(&user_id) {
            sessions.remove(session_id);
        }
        let last = self
            .user_connections
            .remove_if(&user_id, |_, sessions| sessions.is_empty())
            .is_some()
            || !self.user_connections.contains_key(&user_id);

        tracing::debug!(session_id = %session_id, user_id = %user_id, "Connection removed");
        Some((connection, last))
    }

    pub fn get_connection(&self, session_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(session_id).map(|r| r.clone())
    }

    pub fn get_user_connections(&self, user_id: Snowflake) -> Vec<Arc<Connection>> {
        self.user_connections
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .filter_map(|sid| self.connections.get(sid).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_connected(&self, user_id: Snowflake) -> bool {
        self.user_connections.contains_key(&user_id)
    }

    pub async fn join_room(&self, session_id: &str, conversation_id: Snowflake) -> bool {
        match self.get_connection(session_id) {
            Some(connection) => {
                connection.join(conversation_id).await;
                tracing::trace!(session_id = %session_id, conversation_id = %conversation_id, "Joined room");
                true
            }
            None => false,
        }
    }

    pub async fn leave_room(&self, session_id: &str, conversation_id: Snowflake) -> bool {
        match self.get_connection(session_id) {
            Some(connection) => connection.leave(conversation_id).await,
            None => false,
        }
    }

    /// Send a frame to one session; returns false if it was not queued
    pub fn send_to_session(&self, session_id: &str, message: GatewayMessage) -> bool {
        let Some(connection) = self.get_connection(session_id) else {
            return false;
        };
        match connection.send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "Frame dropped");
                false
            }
        }
    }

    /// Deliver an event to every connection of a user. Room-scoped events
    /// only reach connections that joined the event's conversation.
    pub async fn deliver(&self, user_id: Snowflake, event: &ChatEvent) -> usize {
        let room = room_of(event);
        if event.kind.is_room_scoped() && room.is_none() {
            tracing::debug!(event = %event.kind, "Room-scoped event without a conversation");
            return 0;
        }

        let message = GatewayMessage::from_event(event);
        let mut sent = 0;
        for connection in self.get_user_connections(user_id) {
            if let Some(room) = room.filter(|_| event.kind.is_room_scoped()) {
                if !connection.in_room(room).await {
                    continue;
                }
            }
            match connection.send(message.clone()) {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!(
                    session_id = %connection.session_id(),
                    event = %event.kind,
                    error = %e,
                    "Frame dropped"
                ),
            }
        }

        tracing::trace!(user_id = %user_id, event = %event.kind, sent, "Event delivered");
        sent
    }

    /// Deliver an event to every connection, optionally skipping one user
    pub fn deliver_all(&self, event: &ChatEvent, except: Option<Snowflake>) -> usize {
        let message = GatewayMessage::from_event(event);
        let mut sent = 0;

        for entry in &self.connections {
            if Some(entry.user_id()) == except {
                continue;
            }
            if entry.send(message.clone()).is_ok() {
                sent += 1;
            }
        }

        tracing::debug!(event = %event.kind, sent, "Event broadcast");
        sent
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of distinct users with a live connection
    pub fn user_count(&self) -> usize {
        self.user_connections.len()
    }
}

fn room_of(event: &ChatEvent) -> Option<Snowflake> {
    event.conversation_id().and_then(|id| Snowflake::parse(id).ok())
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("users", &self.user_connections.len())
            .finish()
    }
}
