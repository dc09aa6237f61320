//! Message entity - a chat line or a system narration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{AccountId, ChannelId, MessageId};

/// Message type
///
/// Everything except `Chat` carries a delimited system-event payload in
/// `message_content` (see [`crate::codec`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Chat,
    Join,
    Block,
    Unblock,
    Leave,
    Update,
    Delete,
}

impl MessageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "CHAT",
            Self::Join => "JOIN",
            Self::Block => "BLOCK",
            Self::Unblock => "UNBLOCK",
            Self::Leave => "LEAVE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Non-chat messages narrate a state change
    #[inline]
    pub fn is_system(self) -> bool {
        !matches!(self, Self::Chat)
    }

    /// BLOCK and UNBLOCK drive the block state machine
    #[inline]
    pub fn is_block_transition(self) -> bool {
        matches!(self, Self::Block | Self::Unblock)
    }
}

/// Opaque reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_url: String,
}

impl FileAttachment {
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

/// Message entity as delivered by history fetches and the live stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: AccountId,
    #[serde(default)]
    pub sender_first_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub message_content: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

impl Message {
    /// Total order within a channel
    #[inline]
    pub fn ordering_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.sent_at, self.message_id)
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.message_type.is_system()
    }

    #[inline]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Outbound payload sent over the channel connection; the server assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub sender_id: AccountId,
    pub channel_id: ChannelId,
    pub message_content: String,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
    pub sent_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub sender_first_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl OutboundMessage {
    /// Materialize the message once the server has assigned an id
    pub fn into_message(self, message_id: MessageId) -> Message {
        Message {
            message_id,
            channel_id: self.channel_id,
            sender_id: self.sender_id,
            sender_first_name: self.sender_first_name,
            avatar_url: self.avatar_url,
            message_type: self.message_type,
            message_content: self.message_content,
            sent_at: self.sent_at,
            attachments: self.attachments,
        }
    }
}
