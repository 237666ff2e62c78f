//! Redis Pub/Sub subscriber.
//!
//! Holds one dedicated connection, reconnects on failure and re-subscribes to
//! every channel it had. Received envelopes are fanned out on a tokio broadcast
//! channel.

use futures_util::StreamExt;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::pubsub::{PubSubChannel, PubSubEvent};

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Channel closed")]
    ChannelClosed,
}

pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// A decoded message from one of our channels
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub channel: PubSubChannel,
    pub event: PubSubEvent,
}

impl ReceivedMessage {
    /// Foreign channels and undecodable payloads are dropped
    fn from_redis(channel_name: &str, payload: &str) -> Option<Self> {
        let channel = PubSubChannel::parse(channel_name)?;
        match serde_json::from_str(payload) {
            Ok(event) => Some(Self { channel, event }),
            Err(e) => {
                tracing::warn!(channel = %channel_name, error = %e, "Dropping undecodable Pub/Sub payload");
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub redis_url: String,
    /// Capacity of the in-process broadcast channel
    pub broadcast_buffer: usize,
    pub reconnect_delay: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    subscribed: Arc<RwLock<HashSet<String>>>,
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Create a subscriber and start its background listener
    pub fn start(config: SubscriberConfig, initial: &[PubSubChannel]) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(256);
        let subscribed: HashSet<String> = initial.iter().map(PubSubChannel::name).collect();
        let subscribed = Arc::new(RwLock::new(subscribed));

        tokio::spawn(Self::listener_loop(
            config,
            subscribed.clone(),
            broadcast_tx.clone(),
            control_rx,
        ));

        Self {
            subscribed,
            broadcast_tx,
            control_tx,
        }
    }

    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<String>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &subscribed, &broadcast_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {
                    tokio::time::sleep(config.reconnect_delay).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error, reconnecting");
                    tokio::time::sleep(config.reconnect_delay).await;
                }
            }
        }
    }

    /// Run until error or shutdown. `Ok(true)` means stop for good.
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Restore subscriptions after a reconnect
        {
            let channels = subscribed.read().await;
            for channel in channels.iter() {
                pubsub.subscribe(channel).await?;
            }
        }

        tracing::info!("Subscriber connected to Redis");

        loop {
            let command = {
                let mut stream = pubsub.on_message();
                loop {
                    tokio::select! {
                        msg = stream.next() => {
                            let Some(msg) = msg else {
                                tracing::warn!("Pub/Sub stream ended");
                                return Ok(false);
                            };
                            let payload: String = msg.get_payload().unwrap_or_default();
                            if let Some(received) = ReceivedMessage::from_redis(msg.get_channel_name(), &payload) {
                                // No receivers is fine
                                let _ = broadcast_tx.send(received);
                            }
                        }
                        cmd = control_rx.recv() => break cmd,
                    }
                }
            };

            if let Some(command) = &command {
                Self::track(subscribed, command).await;
            }

            match command {
                Some(SubscriberCommand::Subscribe(channels)) => {
                    for channel in channels {
                        pubsub.subscribe(&channel).await?;
                        tracing::debug!(channel = %channel, "Subscribed to channel");
                    }
                }
                Some(SubscriberCommand::Unsubscribe(channels)) => {
                    for channel in channels {
                        pubsub.unsubscribe(&channel).await?;
                        tracing::debug!(channel = %channel, "Unsubscribed from channel");
                    }
                }
                Some(SubscriberCommand::Shutdown) | None => return Ok(true),
            }
        }
    }

    /// Apply a command to the wanted channel set before Redis sees it, so a
    /// call that fails mid-way is replayed by the restore after reconnect
    async fn track(subscribed: &RwLock<HashSet<String>>, command: &SubscriberCommand) {
        let mut set = subscribed.write().await;
        match command {
            SubscriberCommand::Subscribe(channels) => set.extend(channels.iter().cloned()),
            SubscriberCommand::Unsubscribe(channels) => {
                for channel in channels {
                    set.remove(channel);
                }
            }
            SubscriberCommand::Shutdown => {}
        }
    }

    pub async fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names = channels.iter().map(PubSubChannel::name).collect();
        self.control_tx
            .send(SubscriberCommand::Subscribe(names))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    pub async fn unsubscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names = channels.iter().map(PubSubChannel::name).collect();
        self.control_tx
            .send(SubscriberCommand::Unsubscribe(names))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed.read().await.iter().cloned().collect()
    }

    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.control_tx
            .send(SubscriberCommand::Shutdown)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }
}
