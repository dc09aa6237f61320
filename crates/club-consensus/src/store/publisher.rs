//! Message publisher
//!
//! Stores a message, then fans it out to every live stream through a
//! `tokio::sync::broadcast` channel. Streams filter by channel id. Deletion
//! signals travel the same way.

use std::sync::Arc;

use async_trait::async_trait;
use club_core::{ChannelId, ChannelSignal, Message, MessagePublisher, OutboundMessage, RepoResult};
use tokio::sync::broadcast;

use super::InMemoryChannelStore;

/// Default broadcast buffer size
pub const DEFAULT_BROADCAST_BUFFER: usize = 1024;

/// What a live stream receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Message(Message),
    Signal(ChannelSignal),
}

impl LiveEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Message(message) => message.channel_id,
            Self::Signal(signal) => signal.channel_id(),
        }
    }
}

/// Store-then-broadcast publisher
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    store: Arc<InMemoryChannelStore>,
    sender: broadcast::Sender<LiveEvent>,
}

impl BroadcastPublisher {
    pub fn new(store: Arc<InMemoryChannelStore>) -> Self {
        Self::with_capacity(store, DEFAULT_BROADCAST_BUFFER)
    }

    pub fn with_capacity(store: Arc<InMemoryChannelStore>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { store, sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    /// Store and broadcast, returning the stored message
    pub fn publish_message(&self, outbound: OutboundMessage) -> RepoResult<Message> {
        let message = self.store.append(outbound)?;
        // No live streams is not an error
        let receivers = self
            .sender
            .send(LiveEvent::Message(message.clone()))
            .unwrap_or(0);
        tracing::trace!(
            channel_id = %message.channel_id,
            message_id = %message.message_id,
            receivers,
            "Message published"
        );
        Ok(message)
    }

    /// Broadcast a control signal; nothing is stored
    pub fn publish_signal(&self, signal: ChannelSignal) {
        let receivers = self.sender.send(LiveEvent::Signal(signal)).unwrap_or(0);
        tracing::debug!(channel_id = %signal.channel_id(), receivers, ?signal, "Signal published");
    }
}

#[async_trait]
impl MessagePublisher for BroadcastPublisher {
    async fn publish(&self, message: OutboundMessage) -> RepoResult<()> {
        self.publish_message(message).map(|_| ())
    }

    async fn announce_deleted(&self, channel_id: ChannelId) -> RepoResult<()> {
        self.publish_signal(ChannelSignal::ChannelDeleted { channel_id });
        Ok(())
    }
}
