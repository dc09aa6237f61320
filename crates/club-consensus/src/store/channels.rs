//! Channel store backed by DashMap

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use club_core::{
    AccountId, Channel, ChannelId, ChannelRepository, DomainError, Message, MessageId,
    MessageType, OutboundMessage, RepoResult, SystemEvent,
};
use dashmap::DashMap;

#[derive(Debug)]
struct ChannelRecord {
    channel: Channel,
    /// Kept sorted by `(sent_at, message_id)`
    messages: Vec<Message>,
    read_by: HashSet<AccountId>,
    blocked: bool,
    /// Who placed the current block; only they may lift it
    blocker: Option<AccountId>,
}

impl ChannelRecord {
    fn insert_sorted(&mut self, message: Message) {
        let key = message.ordering_key();
        let at = self.messages.partition_point(|m| m.ordering_key() < key);
        self.messages.insert(at, message);
    }

    fn apply_block_transition(&mut self, message_type: MessageType, actor: AccountId) {
        match message_type {
            MessageType::Block => {
                self.blocked = true;
                self.blocker = Some(actor);
            }
            MessageType::Unblock => {
                self.blocked = false;
                self.blocker = None;
            }
            _ => {}
        }
    }

    fn check_unblock(&self, sender: AccountId) -> RepoResult<()> {
        match self.blocker {
            Some(blocker) if self.blocked && blocker == sender => Ok(()),
            _ => Err(DomainError::NotBlocker),
        }
    }
}

/// Channel storage shared by the HTTP handlers, the publisher and the
/// consensus engine
#[derive(Debug)]
pub struct InMemoryChannelStore {
    channels: DashMap<ChannelId, ChannelRecord>,
    next_message_id: AtomicI64,
}

impl Default for InMemoryChannelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChannelStore {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_message_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> MessageId {
        MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Add (or replace) a channel with no messages
    pub fn insert(&self, channel: Channel) {
        tracing::debug!(channel_id = %channel.id, "Channel stored");
        self.channels.insert(
            channel.id,
            ChannelRecord {
                channel,
                messages: Vec::new(),
                read_by: HashSet::new(),
                blocked: false,
                blocker: None,
            },
        );
    }

    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.channels.contains_key(&channel_id)
    }

    /// Store historical messages as-is, keeping their timestamps
    ///
    /// Ids are reassigned so they stay unique across the store.
    pub fn seed(&self, channel_id: ChannelId, messages: Vec<Message>) -> RepoResult<Vec<Message>> {
        let mut record = self
            .channels
            .get_mut(&channel_id)
            .ok_or(DomainError::ChannelNotFound(channel_id))?;

        let mut stored = Vec::with_capacity(messages.len());
        for mut message in messages {
            message.message_id = self.next_id();
            message.channel_id = channel_id;
            // History carries the actor in the narration
            let actor = SystemEvent::from_message(&message)
                .map_or(message.sender_id, |event| event.actor_id());
            record.apply_block_transition(message.message_type, actor);
            record.insert_sorted(message.clone());
            stored.push(message);
        }
        Ok(stored)
    }

    /// Stamp an outbound message with an id and the server clock, then store it
    ///
    /// Chat is refused while a SIMPLE channel is blocked, and only the member
    /// who placed a block may lift it.
    pub fn append(&self, outbound: OutboundMessage) -> RepoResult<Message> {
        let channel_id = outbound.channel_id;
        let mut record = self
            .channels
            .get_mut(&channel_id)
            .ok_or(DomainError::ChannelNotFound(channel_id))?;

        if !record.channel.is_member(outbound.sender_id) {
            return Err(DomainError::NotAMember {
                channel_id,
                account_id: outbound.sender_id,
            });
        }
        if record.blocked && outbound.message_type == MessageType::Chat {
            return Err(DomainError::ChannelBlocked(channel_id));
        }
        if record.channel.is_simple() && outbound.message_type == MessageType::Unblock {
            record.check_unblock(outbound.sender_id)?;
        }

        // Never stamp earlier than the current tail
        let now = Utc::now();
        let sent_at = record
            .messages
            .last()
            .map_or(now, |last| last.sent_at.max(now));

        let mut message = outbound.into_message(self.next_id());
        message.sent_at = sent_at;

        if record.channel.is_simple() {
            record.apply_block_transition(message.message_type, message.sender_id);
        }
        record.insert_sorted(message.clone());
        Ok(message)
    }

    /// Up to `limit` messages strictly older than `before`, newest first
    pub fn history(
        &self,
        channel_id: ChannelId,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> RepoResult<Vec<Message>> {
        let record = self
            .channels
            .get(&channel_id)
            .ok_or(DomainError::ChannelNotFound(channel_id))?;

        Ok(record
            .messages
            .iter()
            .rev()
            .filter(|m| before.map_or(true, |cursor| m.sent_at < cursor))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn last_message(&self, channel_id: ChannelId) -> RepoResult<Option<Message>> {
        self.channels
            .get(&channel_id)
            .map(|record| record.messages.last().cloned())
            .ok_or(DomainError::ChannelNotFound(channel_id))
    }

    pub fn mark_read(&self, channel_id: ChannelId, account_id: AccountId) -> RepoResult<()> {
        let mut record = self
            .channels
            .get_mut(&channel_id)
            .ok_or(DomainError::ChannelNotFound(channel_id))?;
        if !record.channel.is_member(account_id) {
            return Err(DomainError::NotAMember {
                channel_id,
                account_id,
            });
        }
        record.read_by.insert(account_id);
        Ok(())
    }

    pub fn is_read(&self, channel_id: ChannelId, account_id: AccountId) -> RepoResult<bool> {
        self.channels
            .get(&channel_id)
            .map(|record| record.read_by.contains(&account_id))
            .ok_or(DomainError::ChannelNotFound(channel_id))
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelStore {
    async fn find_by_id(&self, id: ChannelId) -> RepoResult<Option<Channel>> {
        Ok(self.channels.get(&id).map(|record| record.channel.clone()))
    }

    async fn delete(&self, id: ChannelId) -> RepoResult<()> {
        let (_, record) = self
            .channels
            .remove(&id)
            .ok_or(DomainError::ChannelNotFound(id))?;
        tracing::info!(
            channel_id = %id,
            messages = record.messages.len(),
            "Channel and messages destroyed"
        );
        Ok(())
    }
}
