//! Delete-request consensus engine
//!
//! One pending request per channel. Votes are applied while holding the
//! channel's map entry, so two votes on the same request never interleave and
//! exactly one of them observes the transition to a resolved state. Deleting
//! the channel, announcing the deletion and broadcasting narration happen
//! after the entry is released.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use club_core::{
    AccountId, ChannelId, ChannelRepository, ChannelType, ConsensusState, DeleteRequest,
    DeleteRequestApi, DeleteRequestId, DomainError, MessagePublisher, MessageType,
    OutboundMessage, RepoResult, VoteOutcome, VoteStatus,
};
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{debug, error, info, instrument, warn};

use super::narration::DeleteNarration;

/// Authoritative owner of every delete request
pub struct ConsensusService {
    channels: Arc<dyn ChannelRepository>,
    publisher: Arc<dyn MessagePublisher>,
    /// Pending request per channel
    active: DashMap<ChannelId, DeleteRequest>,
    /// Every id ever issued, to its channel
    requests: DashMap<DeleteRequestId, ChannelId>,
    /// Final state of resolved requests
    tombstones: DashMap<DeleteRequestId, ConsensusState>,
    next_id: AtomicI64,
}

impl ConsensusService {
    pub fn new(channels: Arc<dyn ChannelRepository>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            channels,
            publisher,
            active: DashMap::new(),
            requests: DashMap::new(),
            tombstones: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Open a delete request on `channel_id`
    #[instrument(skip(self))]
    pub async fn create_request(
        &self,
        channel_id: ChannelId,
        creator_id: AccountId,
        channel_type: ChannelType,
    ) -> RepoResult<DeleteRequest> {
        let channel = self
            .channels
            .find_by_id(channel_id)
            .await?
            .ok_or(DomainError::ChannelNotFound(channel_id))?;

        if channel.channel_type() != channel_type {
            return Err(DomainError::ValidationError(format!(
                "channel {channel_id} is {}, not {}",
                channel.channel_type().as_str(),
                channel_type.as_str()
            )));
        }

        let request = match self.active.entry(channel_id) {
            Entry::Occupied(_) => return Err(DomainError::DeleteRequestExists(channel_id)),
            Entry::Vacant(slot) => {
                let id = DeleteRequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
                let request = DeleteRequest::open(id, &channel, creator_id)?;
                self.requests.insert(id, channel_id);
                slot.insert(request.clone());
                request
            }
        };

        info!(
            delete_request_id = %request.delete_request_id,
            pending = request.pending_count(),
            "Delete request opened"
        );
        self.narrate(&request, creator_id, DeleteNarration::Requested)
            .await;
        Ok(request)
    }

    /// Apply one vote and resolve the request if the ballot is decided
    #[instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        delete_request_id: DeleteRequestId,
        channel_id: ChannelId,
        account_id: AccountId,
        status: VoteStatus,
    ) -> RepoResult<VoteOutcome> {
        let owner = self
            .requests
            .get(&delete_request_id)
            .map(|entry| *entry.value())
            .ok_or(DomainError::DeleteRequestNotFound(delete_request_id))?;
        if owner != channel_id {
            return Err(DomainError::DeleteRequestNotFound(delete_request_id));
        }

        let (outcome, request) = {
            let mut slot = match self.active.entry(channel_id) {
                Entry::Occupied(slot) if slot.get().delete_request_id == delete_request_id => slot,
                _ => return Err(self.stale_or_missing(delete_request_id)),
            };

            let outcome = slot.get_mut().apply_vote(account_id, status)?;
            let request = if outcome.state().is_resolved() {
                self.tombstones.insert(delete_request_id, outcome.state());
                slot.remove()
            } else {
                slot.get().clone()
            };
            (outcome, request)
        };

        match outcome {
            VoteOutcome::ChannelDeleted => {
                self.channels.delete(channel_id).await.map_err(|e| {
                    error!(error = %e, "Consensus reached but channel deletion failed");
                    e
                })?;
                info!(delete_request_id = %delete_request_id, "Channel deleted by consensus");
                if let Err(e) = self.publisher.announce_deleted(channel_id).await {
                    warn!(channel_id = %channel_id, error = %e, "Failed to announce channel deletion");
                }
            }
            VoteOutcome::RequestDenied { by_creator } => {
                info!(
                    delete_request_id = %delete_request_id,
                    by_creator,
                    "Delete request denied"
                );
                let narration = if by_creator {
                    DeleteNarration::Cancelled
                } else {
                    DeleteNarration::Denied
                };
                self.narrate(&request, account_id, narration).await;
            }
            VoteOutcome::VoteRecorded => {
                debug!(pending = request.pending_count(), "Vote recorded");
            }
        }

        Ok(outcome)
    }

    /// The pending request for a channel, if any
    pub fn active_request(&self, channel_id: ChannelId) -> Option<DeleteRequest> {
        self.active.get(&channel_id).map(|entry| entry.value().clone())
    }

    /// Consensus state of a channel's deletion
    pub fn channel_state(&self, channel_id: ChannelId) -> ConsensusState {
        if self.active.contains_key(&channel_id) {
            ConsensusState::Pending
        } else {
            ConsensusState::None
        }
    }

    /// State of a single request, `None` for ids never issued
    pub fn request_state(&self, delete_request_id: DeleteRequestId) -> Option<ConsensusState> {
        if let Some(state) = self.tombstones.get(&delete_request_id) {
            return Some(*state);
        }
        self.requests
            .contains_key(&delete_request_id)
            .then_some(ConsensusState::Pending)
    }

    fn stale_or_missing(&self, delete_request_id: DeleteRequestId) -> DomainError {
        if self.tombstones.contains_key(&delete_request_id) {
            DomainError::StaleVote(delete_request_id)
        } else {
            DomainError::DeleteRequestNotFound(delete_request_id)
        }
    }

    /// Broadcast a DELETE system message; failures are logged, not returned
    async fn narrate(&self, request: &DeleteRequest, actor_id: AccountId, narration: DeleteNarration) {
        let actor_name = request
            .voter(actor_id)
            .map(|v| v.first_name.as_str())
            .unwrap_or_default();

        let content = match narration.event(actor_id, actor_name).encode() {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Could not encode delete narration");
                return;
            }
        };

        let message = OutboundMessage {
            sender_id: actor_id,
            channel_id: request.channel_id,
            message_content: content,
            attachments: Vec::new(),
            sent_at: Utc::now(),
            message_type: MessageType::Delete,
            sender_first_name: actor_name.to_string(),
            avatar_url: None,
        };

        if let Err(e) = self.publisher.publish(message).await {
            warn!(
                channel_id = %request.channel_id,
                error = %e,
                "Failed to broadcast delete narration"
            );
        }
    }
}

impl std::fmt::Debug for ConsensusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusService")
            .field("active", &self.active.len())
            .field("resolved", &self.tombstones.len())
            .finish()
    }
}

#[async_trait]
impl DeleteRequestApi for ConsensusService {
    async fn create(
        &self,
        channel_id: ChannelId,
        creator_id: AccountId,
        channel_type: ChannelType,
    ) -> RepoResult<DeleteRequest> {
        self.create_request(channel_id, creator_id, channel_type)
            .await
    }

    async fn vote(
        &self,
        delete_request_id: DeleteRequestId,
        channel_id: ChannelId,
        account_id: AccountId,
        status: VoteStatus,
    ) -> RepoResult<VoteOutcome> {
        self.cast_vote(delete_request_id, channel_id, account_id, status)
            .await
    }

    async fn find_active(&self, channel_id: ChannelId) -> RepoResult<Option<DeleteRequest>> {
        Ok(self.active_request(channel_id))
    }
}
