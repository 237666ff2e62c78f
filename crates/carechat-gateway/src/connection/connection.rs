//! A single WebSocket connection
//!
//! Connections are authenticated at the upgrade, so the user is known from the
//! start. Everything written to the socket goes through one bounded queue
//! drained by a single writer task.

use crate::protocol::{CloseCode, GatewayMessage, OpCode};
use carechat_core::Snowflake;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Duration, Instant};

/// Item on a connection's outbound queue
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(GatewayMessage),
    Close(CloseCode),
}

/// Why an outbound frame was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for SendError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => Self::Full,
            mpsc::error::TrySendError::Closed(_) => Self::Closed,
        }
    }
}

pub struct Connection {
    session_id: String,
    user_id: Snowflake,
    sender: mpsc::Sender<Outbound>,
    /// Last dispatch sequence written
    sequence: AtomicU64,
    last_heartbeat: RwLock<Instant>,
    /// Conversations this connection has joined
    rooms: RwLock<HashSet<Snowflake>>,
    created_at: Instant,
}

impl Connection {
    pub fn new(session_id: String, user_id: Snowflake, sender: mpsc::Sender<Outbound>) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            user_id,
            sender,
            sequence: AtomicU64::new(0),
            last_heartbeat: RwLock::new(Instant::now()),
            rooms: RwLock::new(HashSet::new()),
            created_at: Instant::now(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Stamp dispatch frames with the next sequence number. Called only by
    /// the writer task so numbering follows socket order.
    pub fn stamp(&self, message: &mut GatewayMessage) {
        if message.op == OpCode::Dispatch {
            message.s = Some(self.next_sequence());
        }
    }

    pub async fn record_heartbeat(&self) {
        *self.last_heartbeat.write().await = Instant::now();
    }

    pub async fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.read().await.elapsed()
    }

    /// Returns true if the room was not joined before
    pub async fn join(&self, conversation_id: Snowflake) -> bool {
        self.rooms.write().await.insert(conversation_id)
    }

    pub async fn leave(&self, conversation_id: Snowflake) -> bool {
        self.rooms.write().await.remove(&conversation_id)
    }

    pub async fn in_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.read().await.contains(&conversation_id)
    }

    pub async fn rooms(&self) -> Vec<Snowflake> {
        self.rooms.read().await.iter().copied().collect()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Queue a frame without waiting; a full queue drops the frame
    pub fn send(&self, message: GatewayMessage) -> Result<(), SendError> {
        self.sender.try_send(Outbound::Frame(message))?;
        Ok(())
    }

    /// Ask the writer to close the socket once the queued frames are out.
    /// Waits at most `grace` for queue space; a writer stuck on a dead peer
    /// never drains it. Returns whether the close was queued.
    pub async fn close(&self, code: CloseCode, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.sender.send(Outbound::Close(code))).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                tracing::debug!(session_id = %self.session_id, "Writer already gone");
                false
            }
            Err(_) => {
                tracing::debug!(session_id = %self.session_id, "Outbound queue stuck, dropping close");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection(buffer: usize) -> (Arc<Connection>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Connection::new("session123".to_string(), Snowflake::new(42), tx), rx)
    }

    #[tokio::test]
    async fn test_stamp_only_numbers_dispatches() {
        let (conn, _rx) = connection(4);

        let mut ack = GatewayMessage::heartbeat_ack();
        conn.stamp(&mut ack);
        assert_eq!(ack.s, None);

        let mut first = GatewayMessage::dispatch("new_message", json!({}));
        let mut second = GatewayMessage::dispatch("message_edited", json!({}));
        conn.stamp(&mut first);
        conn.stamp(&mut second);
        assert_eq!(first.s, Some(1));
        assert_eq!(second.s, Some(2));
        assert_eq!(conn.current_sequence(), 2);
    }

    #[tokio::test]
    async fn test_rooms() {
        let (conn, _rx) = connection(4);
        let room = Snowflake::new(1);

        assert!(conn.join(room).await);
        assert!(!conn.join(room).await);
        assert!(conn.in_room(room).await);
        assert!(conn.leave(room).await);
        assert!(!conn.in_room(room).await);
    }

    #[tokio::test]
    async fn test_send_reports_full_and_closed_queues() {
        let (conn, mut rx) = connection(1);

        conn.send(GatewayMessage::heartbeat_ack()).unwrap();
        assert_eq!(conn.send(GatewayMessage::heartbeat_ack()), Err(SendError::Full));

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(GatewayMessage::heartbeat_ack()))
        );
        drop(rx);
        assert_eq!(conn.send(GatewayMessage::heartbeat_ack()), Err(SendError::Closed));
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_close_gives_up_on_a_stuck_queue() {
        let (conn, mut rx) = connection(1);
        conn.send(GatewayMessage::heartbeat_ack()).unwrap();

        let started = Instant::now();
        assert!(!conn.close(CloseCode::SessionTimeout, Duration::from_millis(50)).await);
        assert!(started.elapsed() < Duration::from_secs(1));

        // With room on the queue the close goes through behind pending frames
        rx.recv().await;
        assert!(conn.close(CloseCode::SessionTimeout, Duration::from_millis(50)).await);
        assert_eq!(rx.recv().await, Some(Outbound::Close(CloseCode::SessionTimeout)));
    }
}
