//! # club-messaging
//!
//! Everything a client needs to keep one channel view in sync: the merged
//! message timeline, the block state machine, the delete-proposal view, the
//! per-channel lifecycle that drives them, and REST clients for the history
//! and delete-request APIs.

pub mod api;
pub mod block;
pub mod lifecycle;
pub mod proposal;
pub mod timeline;

pub use api::{ApiClientError, HttpDeleteRequestApi, HttpHistoryApi};
pub use block::BlockState;
pub use lifecycle::{
    ChannelEvent, ChannelSession, ChannelSummary, ChannelView, DisplayMessage, LifecyclePhase,
    Messenger,
};
pub use proposal::DeleteProposalView;
pub use timeline::MessageTimeline;
