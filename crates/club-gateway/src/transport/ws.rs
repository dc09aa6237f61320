//! WebSocket transport

use async_trait::async_trait;
use club_common::GatewayConfig;
use club_core::{ChannelId, DomainError};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use super::{ConnectionFactory, TransportPair};

/// Inbound frames buffered between the socket and the connection's reader
const INBOUND_BUFFER: usize = 256;

/// Opens `GatewayConfig::url_template` with the channel id filled in
#[derive(Debug, Clone)]
pub struct WsConnectionFactory {
    config: GatewayConfig,
}

impl WsConnectionFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for WsConnectionFactory {
    async fn open(&self, channel_id: ChannelId) -> Result<TransportPair, DomainError> {
        let url = self.config.channel_url(channel_id);
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| DomainError::ConnectionError(format!("{url}: {e}")))?;

        tracing::debug!(channel_id = %channel_id, url = %url, "WebSocket connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(self.config.outbound_buffer);
        let (in_tx, in_rx) = mpsc::channel::<String>(INBOUND_BUFFER);

        // Writer: ends when the connection drops its sender
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                    tracing::warn!(channel_id = %channel_id, error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: ends with the socket or when nobody listens any more
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        if in_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(reason)) => {
                        tracing::debug!(channel_id = %channel_id, reason = ?reason, "Server closed stream");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(channel_id = %channel_id, error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(TransportPair {
            sender: out_tx,
            receiver: in_rx,
        })
    }
}
