//! Delete request entity - the multi-party proposal to delete a channel
//!
//! The request only holds the ballot. Its resolution is derived from the votes:
//! any denial resolves it as denied, unanimous approval resolves it as deleted,
//! anything else keeps it pending. Locking, persistence and side effects belong
//! to whoever owns the request (see the consensus engine).

use serde::{Deserialize, Serialize};

use super::channel::{Channel, ChannelType};
use crate::error::DomainError;
use crate::value_objects::{AccountId, ChannelId, DeleteRequestId};

/// A single member's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteStatus {
    Pending,
    Approved,
    Denied,
}

impl VoteStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
        }
    }
}

/// Consensus state of a channel's deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusState {
    /// No active request
    #[default]
    None,
    Pending,
    ResolvedDeleted,
    ResolvedDenied,
}

impl ConsensusState {
    #[inline]
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::ResolvedDeleted | Self::ResolvedDenied)
    }
}

/// Result of recording a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteOutcome {
    /// Every required member approved; the channel is gone
    ChannelDeleted,
    /// A member denied (or the creator cancelled)
    RequestDenied {
        #[serde(rename = "byCreator")]
        by_creator: bool,
    },
    /// Vote stored; other members still pending
    VoteRecorded,
}

impl VoteOutcome {
    /// Consensus state this outcome resolves to
    pub fn state(self) -> ConsensusState {
        match self {
            Self::ChannelDeleted => ConsensusState::ResolvedDeleted,
            Self::RequestDenied { .. } => ConsensusState::ResolvedDenied,
            Self::VoteRecorded => ConsensusState::Pending,
        }
    }
}

/// One row of the ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVoter {
    pub account_id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub status: VoteStatus,
}

/// Delete request entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub delete_request_id: DeleteRequestId,
    pub channel_id: ChannelId,
    pub creator_id: AccountId,
    pub channel_type: ChannelType,
    pub voters: Vec<DeleteVoter>,
}

impl DeleteRequest {
    /// Open a ballot on `channel` created by `creator_id`.
    ///
    /// The creator is recorded as approved. GROUP channels only let admins create
    /// and vote; SIMPLE channels put both members on the ballot.
    pub fn open(
        delete_request_id: DeleteRequestId,
        channel: &Channel,
        creator_id: AccountId,
    ) -> Result<Self, DomainError> {
        if !channel.is_member(creator_id) {
            return Err(DomainError::NotAMember {
                channel_id: channel.id,
                account_id: creator_id,
            });
        }
        if channel.channel_type() == ChannelType::Group && !channel.is_admin(creator_id) {
            return Err(DomainError::NotEligibleVoter {
                account_id: creator_id,
            });
        }

        let voters: Vec<DeleteVoter> = channel
            .delete_voters()
            .map(|m| DeleteVoter {
                account_id: m.account_id,
                first_name: m.first_name.clone(),
                last_name: m.last_name.clone(),
                status: if m.account_id == creator_id {
                    VoteStatus::Approved
                } else {
                    VoteStatus::Pending
                },
            })
            .collect();

        // Creator-only ballot: nobody left to ask.
        if !voters.iter().any(|v| v.status == VoteStatus::Pending) {
            return Err(DomainError::NoEligibleVoters(channel.id));
        }

        Ok(Self {
            delete_request_id,
            channel_id: channel.id,
            creator_id,
            channel_type: channel.channel_type(),
            voters,
        })
    }

    pub fn voter(&self, account_id: AccountId) -> Option<&DeleteVoter> {
        self.voters.iter().find(|v| v.account_id == account_id)
    }

    pub fn status_of(&self, account_id: AccountId) -> Option<VoteStatus> {
        self.voter(account_id).map(|v| v.status)
    }

    #[inline]
    pub fn is_creator(&self, account_id: AccountId) -> bool {
        self.creator_id == account_id
    }

    pub fn pending_count(&self) -> usize {
        self.voters
            .iter()
            .filter(|v| v.status == VoteStatus::Pending)
            .count()
    }

    /// State derived from the current ballot
    pub fn resolution(&self) -> ConsensusState {
        if self.voters.iter().any(|v| v.status == VoteStatus::Denied) {
            ConsensusState::ResolvedDenied
        } else if self.voters.iter().all(|v| v.status == VoteStatus::Approved) {
            ConsensusState::ResolvedDeleted
        } else {
            ConsensusState::Pending
        }
    }

    /// Record `status` for `account_id` and evaluate the resolution rule.
    ///
    /// Re-submitting an unchanged vote recomputes the same outcome without
    /// counting twice. The caller must hold exclusive access to the request.
    pub fn apply_vote(
        &mut self,
        account_id: AccountId,
        status: VoteStatus,
    ) -> Result<VoteOutcome, DomainError> {
        if self.resolution().is_resolved() {
            return Err(DomainError::StaleVote(self.delete_request_id));
        }
        if status == VoteStatus::Pending {
            return Err(DomainError::ValidationError(
                "a vote must approve or deny".to_string(),
            ));
        }

        let voter = self
            .voters
            .iter_mut()
            .find(|v| v.account_id == account_id)
            .ok_or(DomainError::NotEligibleVoter { account_id })?;
        voter.status = status;

        Ok(match self.resolution() {
            ConsensusState::ResolvedDenied => VoteOutcome::RequestDenied {
                by_creator: account_id == self.creator_id,
            },
            ConsensusState::ResolvedDeleted => VoteOutcome::ChannelDeleted,
            ConsensusState::Pending | ConsensusState::None => VoteOutcome::VoteRecorded,
        })
    }
}
