//! Channel connection management

mod channel_connection;

pub use channel_connection::{
    ChannelConnection, ConnectionState, ConnectionStatus, DeletedHandler, MessageHandler,
};
