//! Frame encoding and decoding

use club_core::{ChannelSignal, Message, OutboundMessage};
use serde::Deserialize;

/// A frame that could not be encoded or decoded
#[derive(Debug, thiserror::Error)]
#[error("invalid frame: {0}")]
pub struct FrameError(#[from] serde_json::Error);

/// Anything the server pushes down a live stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Signal(ChannelSignal),
    Message(Message),
}

/// Parse a pushed frame, signal or message
pub fn decode_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_signal(signal: &ChannelSignal) -> Result<String, FrameError> {
    Ok(serde_json::to_string(signal)?)
}

/// Parse a pushed message
pub fn decode_message(text: &str) -> Result<Message, FrameError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_message(message: &Message) -> Result<String, FrameError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a client send, as the server sees it
pub fn decode_outbound(text: &str) -> Result<OutboundMessage, FrameError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_outbound(message: &OutboundMessage) -> Result<String, FrameError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use club_core::{AccountId, ChannelId, MessageType};

    #[test]
    fn test_outbound_frame_shape() {
        let frame = encode_outbound(&OutboundMessage {
            sender_id: AccountId::new(5),
            channel_id: ChannelId::new(1),
            message_content: "see you at practice".to_string(),
            attachments: vec![],
            sent_at: Utc::now(),
            message_type: MessageType::Chat,
            sender_first_name: "Ana".to_string(),
            avatar_url: None,
        })
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["senderId"], 5);
        assert_eq!(json["channelId"], 1);
        assert_eq!(json["type"], "CHAT");
        assert_eq!(json["senderFirstName"], "Ana");
        assert!(json["attachments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_message("not json").is_err());
        assert!(decode_message(r#"{"messageId": 1}"#).is_err());
    }

    #[test]
    fn test_inbound_tells_signals_from_messages() {
        let frame = encode_signal(&ChannelSignal::ChannelDeleted {
            channel_id: ChannelId::new(3),
        })
        .unwrap();
        assert_eq!(
            decode_inbound(&frame).unwrap(),
            InboundFrame::Signal(ChannelSignal::ChannelDeleted {
                channel_id: ChannelId::new(3)
            })
        );

        let pushed = decode_inbound(
            r#"{"messageId":4,"channelId":3,"senderId":5,"type":"CHAT",
                "messageContent":"hi","sentAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        match pushed {
            InboundFrame::Message(message) => assert_eq!(message.message_content, "hi"),
            other => panic!("expected a message, got {other:?}"),
        }

        assert!(decode_inbound(r#"{"event":"SOMETHING_ELSE"}"#).is_err());
    }

    #[test]
    fn test_decode_accepts_string_ids() {
        let message = decode_message(
            r#"{"messageId":"12","channelId":"1","senderId":"5","type":"CHAT",
                "messageContent":"hi","sentAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(message.message_id.into_inner(), 12);
        assert!(message.attachments.is_empty());
    }
}
