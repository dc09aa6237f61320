//! In-memory transport
//!
//! A hub standing in for the live-stream server. Tests push frames to the
//! peers of a channel, inspect what clients sent, cut connections, or let the
//! hub echo sends back the way the server does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use club_core::{ChannelId, ChannelSignal, DomainError, Message, MessageId, OutboundMessage};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{ConnectionFactory, TransportPair};
use crate::protocol::{decode_outbound, encode_message, encode_signal};

const PEER_BUFFER: usize = 256;

#[derive(Debug, Default)]
struct Hub {
    peers: DashMap<ChannelId, Vec<mpsc::Sender<String>>>,
    sent: Mutex<HashMap<ChannelId, Vec<OutboundMessage>>>,
    opens: DashMap<ChannelId, usize>,
    unavailable: AtomicBool,
    echo: bool,
    next_message_id: AtomicI64,
}

impl Hub {
    fn deliver(&self, channel_id: ChannelId, frame: &str) -> usize {
        let Some(mut peers) = self.peers.get_mut(&channel_id) else {
            return 0;
        };
        peers.retain(|peer| !peer.is_closed());
        peers
            .iter()
            .filter(|peer| peer.try_send(frame.to_string()).is_ok())
            .count()
    }

    fn on_client_frame(&self, channel_id: ChannelId, frame: &str) {
        let outbound = match decode_outbound(frame) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::debug!(channel_id = %channel_id, error = %e, "Hub dropped undecodable frame");
                return;
            }
        };
        self.sent
            .lock()
            .entry(channel_id)
            .or_default()
            .push(outbound.clone());

        if self.echo {
            let id = MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst));
            match encode_message(&outbound.into_message(id)) {
                Ok(echoed) => {
                    self.deliver(channel_id, &echoed);
                }
                Err(e) => tracing::warn!(error = %e, "Hub could not encode echo"),
            }
        }
    }
}

/// In-memory [`ConnectionFactory`]
#[derive(Debug, Clone)]
pub struct MemoryConnectionFactory {
    hub: Arc<Hub>,
    outbound_buffer: usize,
}

impl Default for MemoryConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnectionFactory {
    /// Hub that records sends without answering
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Hub that echoes every send to all peers of the channel, stamped with an
    /// id, as the live-stream server does
    pub fn echoing() -> Self {
        Self::build(true)
    }

    fn build(echo: bool) -> Self {
        Self {
            hub: Arc::new(Hub {
                echo,
                next_message_id: AtomicI64::new(10_000),
                ..Hub::default()
            }),
            outbound_buffer: PEER_BUFFER,
        }
    }

    /// Capacity of each client's outbound queue
    pub fn with_outbound_buffer(mut self, outbound_buffer: usize) -> Self {
        self.outbound_buffer = outbound_buffer;
        self
    }

    /// Make subsequent opens fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.hub.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Push a message to every peer of its channel; returns how many got it
    pub fn push(&self, message: &Message) -> usize {
        match encode_message(message) {
            Ok(frame) => self.hub.deliver(message.channel_id, &frame),
            Err(_) => 0,
        }
    }

    /// Push a signal to every peer of its channel
    pub fn push_signal(&self, signal: &ChannelSignal) -> usize {
        match encode_signal(signal) {
            Ok(frame) => self.hub.deliver(signal.channel_id(), &frame),
            Err(_) => 0,
        }
    }

    /// Push an arbitrary text frame
    pub fn push_raw(&self, channel_id: ChannelId, frame: &str) -> usize {
        self.hub.deliver(channel_id, frame)
    }

    /// Drop every peer of the channel, ending their inbound streams
    pub fn disconnect(&self, channel_id: ChannelId) {
        self.hub.peers.remove(&channel_id);
    }

    /// Everything clients sent on the channel so far
    pub fn sent(&self, channel_id: ChannelId) -> Vec<OutboundMessage> {
        self.hub
            .sent
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times the channel has been opened
    pub fn open_count(&self, channel_id: ChannelId) -> usize {
        self.hub.opens.get(&channel_id).map_or(0, |count| *count)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryConnectionFactory {
    async fn open(&self, channel_id: ChannelId) -> Result<TransportPair, DomainError> {
        if self.hub.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::ConnectionError(
                "live stream unavailable".to_string(),
            ));
        }

        let (out_tx, mut out_rx) = mpsc::channel::<String>(self.outbound_buffer);
        let (in_tx, in_rx) = mpsc::channel::<String>(PEER_BUFFER);

        self.hub.peers.entry(channel_id).or_default().push(in_tx);
        *self.hub.opens.entry(channel_id).or_default() += 1;

        let hub = self.hub.clone();
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                hub.on_client_frame(channel_id, &frame);
            }
        });

        Ok(TransportPair {
            sender: out_tx,
            receiver: in_rx,
        })
    }
}
