//! Client view of a channel's delete proposal
//!
//! Holds the last authoritative snapshot from the delete-request API plus the
//! viewer's tentative votes. A tentative vote is shown until a snapshot of the
//! same request records a decided vote for that voter, then the snapshot wins.

use std::collections::HashMap;

use club_core::{
    AccountId, Channel, ChannelType, ConsensusState, DeleteRequest, DeleteRequestId,
    DeleteVoter, VoteStatus,
};

#[derive(Debug, Clone, Default)]
pub struct DeleteProposalView {
    snapshot: Option<DeleteRequest>,
    tentative: HashMap<AccountId, VoteStatus>,
}

impl DeleteProposalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the authoritative snapshot (`None` when nothing is pending)
    pub fn apply_snapshot(&mut self, snapshot: Option<DeleteRequest>) {
        match &snapshot {
            Some(next)
                if self
                    .snapshot
                    .as_ref()
                    .is_some_and(|prev| prev.delete_request_id == next.delete_request_id) =>
            {
                // A snapshot still showing PENDING predates the vote
                self.tentative.retain(|account_id, _| {
                    next.status_of(*account_id)
                        .map_or(true, |status| status == VoteStatus::Pending)
                });
            }
            _ => self.tentative.clear(),
        }
        self.snapshot = snapshot;
    }

    /// Show `status` for `account_id` until the next snapshot covers it
    pub fn record_tentative(&mut self, account_id: AccountId, status: VoteStatus) {
        if self.snapshot.is_some() {
            self.tentative.insert(account_id, status);
        }
    }

    pub fn discard_tentative(&mut self, account_id: AccountId) {
        self.tentative.remove(&account_id);
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
        self.tentative.clear();
    }

    pub fn request_id(&self) -> Option<DeleteRequestId> {
        self.snapshot.as_ref().map(|r| r.delete_request_id)
    }

    pub fn state(&self) -> ConsensusState {
        if self.snapshot.is_some() {
            ConsensusState::Pending
        } else {
            ConsensusState::None
        }
    }

    /// Effective status for one voter
    pub fn status_of(&self, account_id: AccountId) -> Option<VoteStatus> {
        let snapshot = self.snapshot.as_ref()?;
        let authoritative = snapshot.status_of(account_id)?;
        Some(self.tentative.get(&account_id).copied().unwrap_or(authoritative))
    }

    /// Snapshot with tentative votes merged in
    pub fn merged(&self) -> Option<DeleteRequest> {
        let mut request = self.snapshot.clone()?;
        for voter in &mut request.voters {
            if let Some(status) = self.tentative.get(&voter.account_id) {
                voter.status = *status;
            }
        }
        Some(request)
    }

    pub fn voters(&self) -> Vec<DeleteVoter> {
        self.merged().map(|r| r.voters).unwrap_or_default()
    }

    /// A non-creator voter who has not voted yet
    pub fn can_vote(&self, account_id: AccountId) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|r| !r.is_creator(account_id))
            && self.status_of(account_id) == Some(VoteStatus::Pending)
    }

    /// Only the creator can cancel, by voting DENIED
    pub fn can_cancel(&self, account_id: AccountId) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|r| r.is_creator(account_id))
    }

    /// Whether `account_id` may open a new proposal on `channel`
    pub fn can_request(&self, channel: &Channel, account_id: AccountId) -> bool {
        if self.snapshot.is_some() {
            return false;
        }
        match channel.channel_type() {
            ChannelType::Simple => channel.is_member(account_id),
            ChannelType::Group => channel.is_admin(account_id),
        }
    }
}
