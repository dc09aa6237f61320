//! Block state of a two-party channel
//!
//! Only BLOCK and UNBLOCK messages move the state, and only forward in message
//! order: a transition older than the one currently applied is ignored, so a
//! late history page cannot undo a newer state.

use chrono::{DateTime, Utc};
use club_core::{AccountId, Channel, ChannelId, DomainError, Message, MessageId, MessageType, SystemEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockState {
    channel_id: ChannelId,
    supported: bool,
    blocked: bool,
    blocker: Option<AccountId>,
    applied: Option<(DateTime<Utc>, MessageId)>,
}

impl BlockState {
    /// Seed from the channel's last known message
    pub fn seed(channel: &Channel, last_message: Option<&Message>) -> Self {
        let mut state = Self {
            channel_id: channel.id,
            supported: channel.is_simple(),
            blocked: false,
            blocker: None,
            applied: None,
        };
        if let Some(message) = last_message {
            state.apply(message);
        }
        state
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Account that placed the current block
    pub fn blocker(&self) -> Option<AccountId> {
        self.blocker
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Apply a message; returns `true` when the blocked flag changed
    pub fn apply(&mut self, message: &Message) -> bool {
        if !self.supported || !message.message_type.is_block_transition() {
            return false;
        }
        let key = message.ordering_key();
        if self.applied.is_some_and(|applied| key <= applied) {
            tracing::trace!(
                channel_id = %self.channel_id,
                message_id = %message.message_id,
                "Ignoring block transition older than current state"
            );
            return false;
        }
        self.applied = Some(key);

        let was_blocked = self.blocked;
        match message.message_type {
            MessageType::Block => {
                self.blocked = true;
                self.blocker = Some(actor_of(message));
            }
            _ => {
                self.blocked = false;
                self.blocker = None;
            }
        }
        was_blocked != self.blocked
    }

    /// Whether the composer may be used, given the timeline's last message
    pub fn composer_enabled(&self, last_in_timeline: Option<&Message>) -> bool {
        !self.blocked
            && !last_in_timeline.is_some_and(|m| self.supported && m.message_type == MessageType::Block)
    }

    /// Gate for outbound chat
    pub fn check_send(&self, last_in_timeline: Option<&Message>) -> Result<(), DomainError> {
        if self.composer_enabled(last_in_timeline) {
            Ok(())
        } else {
            Err(DomainError::ChannelBlocked(self.channel_id))
        }
    }

    /// Gate for a BLOCK request
    pub fn check_block(&self) -> Result<(), DomainError> {
        if !self.supported {
            return Err(DomainError::BlockingUnsupported(self.channel_id));
        }
        if self.blocked {
            return Err(DomainError::ChannelBlocked(self.channel_id));
        }
        Ok(())
    }

    /// Gate for an UNBLOCK request by `account_id`
    pub fn check_unblock(&self, account_id: AccountId) -> Result<(), DomainError> {
        if !self.supported {
            return Err(DomainError::BlockingUnsupported(self.channel_id));
        }
        match self.blocker {
            Some(blocker) if self.blocked && blocker == account_id => Ok(()),
            _ => Err(DomainError::NotBlocker),
        }
    }
}

/// Actor encoded in the narration, else the sender
fn actor_of(message: &Message) -> AccountId {
    SystemEvent::from_message(message).map_or(message.sender_id, |event| event.actor_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use club_core::{ChannelMember, MemberRole};

    fn simple() -> Channel {
        Channel::new_simple(
            ChannelId::new(1),
            ChannelMember::simple(AccountId::new(5), "Ana", "Ruiz"),
            ChannelMember::simple(AccountId::new(7), "Ben", "Okafor"),
        )
        .unwrap()
    }

    fn group() -> Channel {
        Channel::new_group(
            ChannelId::new(2),
            "coaches",
            (1..=3)
                .map(|id| ChannelMember::with_role(AccountId::new(id), MemberRole::Admin, "C", "Oach"))
                .collect(),
        )
        .unwrap()
    }

    fn message(id: i64, minute: i64, message_type: MessageType, actor: i64) -> Message {
        let content = match message_type {
            MessageType::Block => format!("BLOCK*{actor}*You blocked them*You were blocked"),
            MessageType::Unblock => format!("UNBLOCK*{actor}*You unblocked them*You were unblocked"),
            _ => "hi".to_string(),
        };
        Message {
            message_id: MessageId::new(id),
            channel_id: ChannelId::new(1),
            sender_id: AccountId::new(actor),
            sender_first_name: String::new(),
            avatar_url: None,
            message_type,
            message_content: content,
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minute),
            attachments: vec![],
        }
    }

    #[test]
    fn test_seeded_from_last_message() {
        let block = message(1, 0, MessageType::Block, 5);
        let state = BlockState::seed(&simple(), Some(&block));
        assert!(state.is_blocked());
        assert_eq!(state.blocker(), Some(AccountId::new(5)));

        let chat = message(2, 1, MessageType::Chat, 7);
        assert!(!BlockState::seed(&simple(), Some(&chat)).is_blocked());
        assert!(!BlockState::seed(&simple(), None).is_blocked());
    }

    #[test]
    fn test_block_rejects_send_until_unblock() {
        let mut state = BlockState::seed(&simple(), None);
        let block = message(1, 0, MessageType::Block, 5);
        assert!(state.apply(&block));
        assert_eq!(
            state.check_send(Some(&block)),
            Err(DomainError::ChannelBlocked(ChannelId::new(1)))
        );

        let unblock = message(2, 1, MessageType::Unblock, 5);
        assert!(state.apply(&unblock));
        assert!(state.check_send(Some(&unblock)).is_ok());
    }

    #[test]
    fn test_chat_does_not_change_state() {
        let mut state = BlockState::seed(&simple(), None);
        state.apply(&message(1, 0, MessageType::Block, 5));
        assert!(!state.apply(&message(2, 1, MessageType::Chat, 7)));
        assert!(state.is_blocked());
    }

    #[test]
    fn test_older_transition_is_ignored() {
        let mut state = BlockState::seed(&simple(), None);
        state.apply(&message(5, 5, MessageType::Unblock, 5));
        // Late history page carrying the earlier BLOCK
        assert!(!state.apply(&message(3, 3, MessageType::Block, 5)));
        assert!(!state.is_blocked());
    }

    #[test]
    fn test_last_block_message_disables_composer() {
        let state = BlockState::seed(&simple(), None);
        let block = message(1, 0, MessageType::Block, 5);
        assert!(!state.composer_enabled(Some(&block)));
        assert!(state.composer_enabled(None));
    }

    #[test]
    fn test_only_blocker_may_unblock() {
        let mut state = BlockState::seed(&simple(), None);
        state.apply(&message(1, 0, MessageType::Block, 5));
        assert_eq!(state.check_unblock(AccountId::new(7)), Err(DomainError::NotBlocker));
        assert!(state.check_unblock(AccountId::new(5)).is_ok());
        assert_eq!(
            state.check_block(),
            Err(DomainError::ChannelBlocked(ChannelId::new(1)))
        );
    }

    #[test]
    fn test_group_ignores_block_messages() {
        let mut state = BlockState::seed(&group(), None);
        assert!(!state.apply(&message(1, 0, MessageType::Block, 1)));
        assert!(!state.is_blocked());
        assert_eq!(
            state.check_block(),
            Err(DomainError::BlockingUnsupported(ChannelId::new(2)))
        );
    }
}
