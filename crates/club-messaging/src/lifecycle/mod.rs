//! Channel lifecycle
//!
//! A [`Messenger`] opens one [`ChannelSession`] per channel view. The session
//! goes `Loading -> Ready -> Closed`, owns its connection and timeline, and is
//! the only place that talks to the history, delete-request and identity
//! collaborators.

mod messenger;
mod session;
mod view;

pub use messenger::Messenger;
pub use session::ChannelSession;
pub use view::{ChannelView, DisplayMessage};

use club_core::{Channel, DeleteRequest, Message};
use serde::Serialize;

/// Where a session is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    Loading,
    Ready,
    Closed,
}

/// What the channel list knows about a channel before it is opened
#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub channel: Channel,
    /// Seeds the block state
    pub last_message: Option<Message>,
}

impl ChannelSummary {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            last_message: None,
        }
    }

    pub fn with_last_message(mut self, message: Message) -> Self {
        self.last_message = Some(message);
        self
    }
}

/// Notifications pushed to subscribers of a session
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Initial load finished
    Ready,
    MessageReceived(Message),
    HistoryLoaded { added: usize, has_more: bool },
    BlockChanged { blocked: bool },
    /// Merged delete-proposal view; `None` when nothing is pending
    DeleteRequestUpdated(Option<DeleteRequest>),
    ConnectionFailed(String),
    ConnectionRestored,
    FetchFailed(String),
    /// The channel was deleted; navigate away
    Redirect,
    Closed,
}
