//! Domain entities - core messaging objects

mod channel;
mod delete_request;
mod message;
mod signal;
mod viewer;

pub use channel::{Channel, ChannelMember, ChannelType, MemberRole};
pub use delete_request::{ConsensusState, DeleteRequest, DeleteVoter, VoteOutcome, VoteStatus};
pub use message::{FileAttachment, Message, MessageType, OutboundMessage};
pub use signal::ChannelSignal;
pub use viewer::Viewer;
