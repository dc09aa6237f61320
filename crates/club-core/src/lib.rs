//! # club-core
//!
//! Domain layer for club direct messaging: channels, messages, delete requests,
//! the system-message codec, and the ports the outer crates implement.
//! This crate has no dependencies on infrastructure (network, runtime, storage).

pub mod codec;
pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use codec::{render_text, Narration, SystemEvent, SystemEventKind, FALLBACK_TEXT};
pub use entities::{
    Channel, ChannelMember, ChannelSignal, ChannelType, ConsensusState, DeleteRequest, DeleteVoter,
    FileAttachment, MemberRole, Message, MessageType, OutboundMessage, Viewer, VoteOutcome,
    VoteStatus,
};
pub use error::DomainError;
pub use traits::{
    ChannelRepository, DeleteRequestApi, HistoryApi, IdentityProvider, MessagePublisher,
    RepoResult,
};
pub use value_objects::{AccountId, ChannelId, DeleteRequestId, IdParseError, MessageId};
