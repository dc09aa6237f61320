//! Value objects - immutable types that represent domain concepts

mod ids;

pub use ids::{AccountId, ChannelId, DeleteRequestId, IdParseError, MessageId};
