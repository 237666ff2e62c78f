//! Event dispatcher
//!
//! Receives events from Redis Pub/Sub and dispatches them to this instance's
//! WebSocket connections. Each instance subscribes to the channels of the
//! users it currently holds, plus the broadcast channel.

use crate::connection::ConnectionManager;
use carechat_cache::{PubSubChannel, ReceivedMessage, Subscriber, SubscriberConfig, SubscriberResult};
use carechat_core::Snowflake;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct EventDispatcher {
    connections: Arc<ConnectionManager>,
    subscriber: Subscriber,
    running: AtomicBool,
}

impl EventDispatcher {
    /// Connect the subscriber (broadcast channel only) without starting delivery
    pub fn new(config: SubscriberConfig, connections: Arc<ConnectionManager>) -> Self {
        let subscriber = Subscriber::start(config, &[PubSubChannel::broadcast()]);
        Self {
            connections,
            subscriber,
            running: AtomicBool::new(false),
        }
    }

    pub async fn subscribe_user(&self, user_id: Snowflake) -> SubscriberResult<()> {
        self.subscriber.subscribe(&[PubSubChannel::user(user_id)]).await
    }

    pub async fn unsubscribe_user(&self, user_id: Snowflake) -> SubscriberResult<()> {
        self.subscriber.unsubscribe(&[PubSubChannel::user(user_id)]).await
    }

    /// Spawn the delivery loop
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher is already running");
            return;
        }

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        });

        tracing::info!("Event dispatcher started");
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.subscriber.shutdown().await.ok();
        tracing::info!("Event dispatcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self) {
        let mut receiver = self.subscriber.receiver();

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => self.handle_message(msg).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Event dispatcher lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Event dispatcher channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Event dispatcher loop ended");
    }

    async fn handle_message(&self, msg: ReceivedMessage) {
        let envelope = msg.event;
        match msg.channel {
            PubSubChannel::User(user_id) => {
                let sent = self.connections.deliver(user_id, &envelope.event).await;
                tracing::trace!(
                    user_id = %user_id,
                    event = %envelope.event.kind,
                    sent,
                    "Event dispatched to user"
                );
            }
            PubSubChannel::Broadcast => {
                self.connections.deliver_all(&envelope.event, envelope.except);
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
