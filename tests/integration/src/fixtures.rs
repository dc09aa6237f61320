//! Test fixtures and data generators

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use club_core::{
    AccountId, Channel, ChannelId, ChannelMember, IdentityProvider, MemberRole, Message, MessageId,
    MessageType, Viewer,
};

/// Counter for unique channel ids
static CHANNEL_COUNTER: AtomicI64 = AtomicI64::new(100);

pub fn unique_channel_id() -> ChannelId {
    ChannelId::new(CHANNEL_COUNTER.fetch_add(1, Ordering::SeqCst))
}

pub const ANA: i64 = 5;
pub const BEN: i64 = 7;

/// Identity provider that always answers with one viewer
pub struct StaticIdentity(pub Viewer);

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Viewer {
        self.0.clone()
    }
}

pub fn viewer(account_id: i64, first_name: &str) -> Viewer {
    Viewer::new(AccountId::new(account_id), first_name)
}

/// Ana and Ben
pub fn simple_channel() -> Channel {
    Channel::new_simple(
        unique_channel_id(),
        ChannelMember::simple(AccountId::new(ANA), "Ana", "Ruiz"),
        ChannelMember::simple(AccountId::new(BEN), "Ben", "Okafor"),
    )
    .expect("valid simple channel")
}

/// Admins 1..=`admins`, then plain members
pub fn group_channel(admins: i64, members: i64) -> Channel {
    let roster = (1..=admins + members)
        .map(|id| {
            let role = if id <= admins {
                MemberRole::Admin
            } else {
                MemberRole::Member
            };
            ChannelMember::with_role(AccountId::new(id), role, format!("User{id}"), "Test")
        })
        .collect();
    Channel::new_group(unique_channel_id(), "Coaches", roster).expect("valid group channel")
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Chat message `minute` minutes after [`epoch`]; the store reassigns the id
pub fn chat_at(channel_id: ChannelId, sender: i64, minute: i64) -> Message {
    Message {
        message_id: MessageId::new(0),
        channel_id,
        sender_id: AccountId::new(sender),
        sender_first_name: String::new(),
        avatar_url: None,
        message_type: MessageType::Chat,
        message_content: format!("message at minute {minute}"),
        sent_at: epoch() + Duration::minutes(minute),
        attachments: vec![],
    }
}
