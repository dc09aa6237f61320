//! Live channel stream
//!
//! Pushes every message published to the channel as a JSON text frame and
//! publishes inbound `OutboundMessage` frames. When the channel is deleted the
//! stream sends a `CHANNEL_DELETED` signal frame and closes.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use club_core::{ChannelId, ChannelSignal, DomainError, OutboundMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::parse_channel_id;
use crate::response::ApiResult;
use crate::state::AppState;
use crate::store::LiveEvent;

/// GET /ws/channel/{channel_id}
pub async fn live_handler(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    ws: WebSocketUpgrade,
) -> ApiResult<impl IntoResponse> {
    let channel_id = parse_channel_id(&channel_id)?;
    if !state.store().contains(channel_id) {
        return Err(DomainError::ChannelNotFound(channel_id).into());
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(state, channel_id, socket)))
}

async fn handle_socket(state: AppState, channel_id: ChannelId, socket: WebSocket) {
    let stream_id = Uuid::new_v4();
    let mut feed = state.publisher().subscribe();
    let (mut sink, mut stream) = socket.split();

    tracing::info!(stream_id = %stream_id, channel_id = %channel_id, "Live stream opened");

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match feed.recv().await {
                Ok(event) if event.channel_id() == channel_id => event,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(stream_id = %stream_id, skipped, "Live stream lagged behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            // A deletion signal is the last frame of the stream
            let last = matches!(event, LiveEvent::Signal(ChannelSignal::ChannelDeleted { .. }));
            let encoded = match &event {
                LiveEvent::Message(message) => serde_json::to_string(message),
                LiveEvent::Signal(signal) => serde_json::to_string(signal),
            };
            let json = match encoded {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(stream_id = %stream_id, error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json)).await.is_err() {
                tracing::debug!(stream_id = %stream_id, "Client went away");
                break;
            }
            if last {
                tracing::info!(stream_id = %stream_id, "Channel deleted, ending live stream");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    handle_text_frame(&recv_state, channel_id, stream_id, &text);
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(stream_id = %stream_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    // Whichever side finishes first tears down the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(stream_id = %stream_id, channel_id = %channel_id, "Live stream closed");
}

fn handle_text_frame(state: &AppState, channel_id: ChannelId, stream_id: Uuid, text: &str) {
    let outbound: OutboundMessage = match serde_json::from_str(text) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::debug!(stream_id = %stream_id, error = %e, "Dropping undecodable frame");
            return;
        }
    };

    if outbound.channel_id != channel_id {
        tracing::warn!(
            stream_id = %stream_id,
            target = %outbound.channel_id,
            "Dropping frame addressed to another channel"
        );
        return;
    }

    if let Err(e) = state.publisher().publish_message(outbound) {
        tracing::warn!(stream_id = %stream_id, error = %e, "Rejected inbound message");
    }
}
