//! In-memory persistence
//!
//! Channels, their messages and read flags, plus the broadcast feed that
//! carries newly stored messages and deletion signals to live streams.

mod channels;
mod publisher;

pub use channels::InMemoryChannelStore;
pub use publisher::{BroadcastPublisher, LiveEvent};
