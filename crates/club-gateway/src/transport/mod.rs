//! Transports behind a channel connection

mod memory;
mod ws;

use async_trait::async_trait;
use club_core::{ChannelId, DomainError};
use tokio::sync::mpsc;

pub use memory::MemoryConnectionFactory;
pub use ws::WsConnectionFactory;

/// Frames to and from one open channel stream
///
/// Dropping `sender` closes the outbound half. `receiver` yields `None` once
/// the remote side is gone.
#[derive(Debug)]
pub struct TransportPair {
    pub sender: mpsc::Sender<String>,
    pub receiver: mpsc::Receiver<String>,
}

/// Opens the live stream of a channel
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Fails with `DomainError::ConnectionError` when the stream cannot be opened
    async fn open(&self, channel_id: ChannelId) -> Result<TransportPair, DomainError>;
}
