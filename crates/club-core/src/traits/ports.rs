//! Port traits
//!
//! The core defines what it needs from the outside world; REST clients,
//! in-memory stores and test fakes provide the implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Channel, ChannelType, DeleteRequest, Message, OutboundMessage, Viewer, VoteOutcome, VoteStatus,
};
use crate::error::DomainError;
use crate::value_objects::{AccountId, ChannelId, DeleteRequestId};

/// Result type for port operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Client-side ports
// ============================================================================

/// Paginated message history and the per-channel read flag
#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Fetch up to `limit` messages strictly older than `before` (or the newest
    /// messages when `before` is `None`), newest first
    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> RepoResult<Vec<Message>>;

    /// Mark the channel as read for `account_id`
    async fn mark_read(&self, channel_id: ChannelId, account_id: AccountId) -> RepoResult<()>;
}

/// Channel deletion proposals
#[async_trait]
pub trait DeleteRequestApi: Send + Sync {
    /// Open a delete request; fails with `DeleteRequestExists` if one is pending
    async fn create(
        &self,
        channel_id: ChannelId,
        creator_id: AccountId,
        channel_type: ChannelType,
    ) -> RepoResult<DeleteRequest>;

    /// Record a vote; fails with `StaleVote` once the request is resolved
    async fn vote(
        &self,
        delete_request_id: DeleteRequestId,
        channel_id: ChannelId,
        account_id: AccountId,
        status: VoteStatus,
    ) -> RepoResult<VoteOutcome>;

    /// The pending request for a channel, if any
    async fn find_active(&self, channel_id: ChannelId) -> RepoResult<Option<DeleteRequest>>;
}

/// Who is looking at the screen
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Viewer;
}

// ============================================================================
// Server-side ports
// ============================================================================

/// Channel storage as needed by the consensus engine
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Find channel by ID
    async fn find_by_id(&self, id: ChannelId) -> RepoResult<Option<Channel>>;

    /// Destroy the channel and every message in it
    async fn delete(&self, id: ChannelId) -> RepoResult<()>;
}

/// Broadcast of server-authored system messages to a channel's live stream
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> RepoResult<()>;

    /// Tell every live stream of the channel that it no longer exists
    async fn announce_deleted(&self, channel_id: ChannelId) -> RepoResult<()>;
}
