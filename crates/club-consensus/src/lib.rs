//! # club-consensus
//!
//! Authoritative delete-request consensus plus a small reference backend
//! (history, read flag, live stream) built with Axum.

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod store;

pub use server::{create_app, run, run_server};
pub use services::ConsensusService;
pub use state::AppState;
pub use store::{BroadcastPublisher, InMemoryChannelStore, LiveEvent};
