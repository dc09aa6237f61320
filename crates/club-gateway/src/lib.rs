//! # club-gateway
//!
//! One live duplex connection per open channel view. The transport is
//! injected through [`ConnectionFactory`]: WebSocket in production, an
//! in-memory hub in tests.

pub mod connection;
pub mod protocol;
pub mod transport;

pub use connection::{
    ChannelConnection, ConnectionState, ConnectionStatus, DeletedHandler, MessageHandler,
};
pub use protocol::{decode_inbound, decode_message, encode_outbound, FrameError, InboundFrame};
pub use transport::{ConnectionFactory, MemoryConnectionFactory, TransportPair, WsConnectionFactory};
