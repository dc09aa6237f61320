//! Ports - the interfaces the messaging core consumes

mod ports;

pub use ports::{
    ChannelRepository, DeleteRequestApi, HistoryApi, IdentityProvider, MessagePublisher,
    RepoResult,
};
