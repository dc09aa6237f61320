//! Control signals pushed on a channel's live stream alongside messages

use serde::{Deserialize, Serialize};

use crate::value_objects::ChannelId;

/// Server-side event that is not a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelSignal {
    /// Consensus destroyed the channel; the stream closes right after
    ChannelDeleted {
        #[serde(rename = "channelId")]
        channel_id: ChannelId,
    },
}

impl ChannelSignal {
    pub fn channel_id(self) -> ChannelId {
        match self {
            Self::ChannelDeleted { channel_id } => channel_id,
        }
    }
}
