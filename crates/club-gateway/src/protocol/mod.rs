//! Wire frames
//!
//! Inbound frames are JSON `Message`s or `ChannelSignal`s, outbound frames
//! JSON `OutboundMessage`s, one per text frame.

mod frames;

pub use frames::{
    decode_inbound, decode_message, decode_outbound, encode_message, encode_outbound,
    encode_signal, FrameError, InboundFrame,
};
