//! Integration test utilities for club messaging
//!
//! Spawns the consensus server on an ephemeral port and builds clients
//! (HTTP and WebSocket) pointed at it.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
