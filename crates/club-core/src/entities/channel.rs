//! Channel entity - a two-party or group conversation

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{AccountId, ChannelId};

/// Channel type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    /// Exactly two members; supports blocking
    Simple,
    /// Three or more members governed by admins
    Group,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Group => "GROUP",
        }
    }
}

/// Member role inside a group channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
}

/// A channel member as seen by the messaging core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMember {
    pub account_id: AccountId,
    /// `None` for SIMPLE channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl ChannelMember {
    /// Member of a SIMPLE channel (no role)
    pub fn simple(account_id: AccountId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            account_id,
            role: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Member of a GROUP channel
    pub fn with_role(
        account_id: AccountId,
        role: MemberRole,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            role: Some(role),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Some(MemberRole::Admin)
    }
}

/// Channel entity
///
/// The channel type is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ChannelFields")]
pub struct Channel {
    pub id: ChannelId,
    channel_type: ChannelType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
    /// Read flag for the viewing member
    #[serde(default)]
    pub read: bool,
    members: Vec<ChannelMember>,
}

/// Wire shape of a channel, checked before it becomes a [`Channel`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelFields {
    id: ChannelId,
    channel_type: ChannelType,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture_url: Option<String>,
    #[serde(default)]
    read: bool,
    members: Vec<ChannelMember>,
}

impl TryFrom<ChannelFields> for Channel {
    type Error = DomainError;

    fn try_from(fields: ChannelFields) -> Result<Self, Self::Error> {
        let channel = Self {
            id: fields.id,
            channel_type: fields.channel_type,
            name: fields.name,
            picture_url: fields.picture_url,
            read: fields.read,
            members: fields.members,
        };
        channel.validate()?;
        Ok(channel)
    }
}

impl Channel {
    /// Create a two-party channel
    pub fn new_simple(id: ChannelId, a: ChannelMember, b: ChannelMember) -> Result<Self, DomainError> {
        Self::new(id, ChannelType::Simple, None, vec![a, b])
    }

    /// Create a group channel
    pub fn new_group(
        id: ChannelId,
        name: impl Into<String>,
        members: Vec<ChannelMember>,
    ) -> Result<Self, DomainError> {
        Self::new(id, ChannelType::Group, Some(name.into()), members)
    }

    /// Create a channel, validating the membership invariants of its type
    pub fn new(
        id: ChannelId,
        channel_type: ChannelType,
        name: Option<String>,
        members: Vec<ChannelMember>,
    ) -> Result<Self, DomainError> {
        let channel = Self {
            id,
            channel_type,
            name,
            picture_url: None,
            read: true,
            members,
        };
        channel.validate()?;
        Ok(channel)
    }

    /// Check the membership invariants
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut ids: Vec<AccountId> = self.members.iter().map(|m| m.account_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.members.len() {
            return Err(DomainError::InvalidChannel("duplicate member".to_string()));
        }

        match self.channel_type {
            ChannelType::Simple => {
                if self.members.len() != 2 {
                    return Err(DomainError::InvalidChannel(format!(
                        "simple channel needs exactly 2 members, got {}",
                        self.members.len()
                    )));
                }
                if self.members.iter().any(|m| m.role.is_some()) {
                    return Err(DomainError::InvalidChannel(
                        "simple channel members carry no role".to_string(),
                    ));
                }
            }
            ChannelType::Group => {
                if self.members.len() < 3 {
                    return Err(DomainError::InvalidChannel(format!(
                        "group channel needs at least 3 members, got {}",
                        self.members.len()
                    )));
                }
                if self.members.iter().any(|m| m.role.is_none()) {
                    return Err(DomainError::InvalidChannel(
                        "group channel members need a role".to_string(),
                    ));
                }
                if !self.members.iter().any(ChannelMember::is_admin) {
                    return Err(DomainError::InvalidChannel(
                        "group channel needs an admin".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    #[inline]
    pub fn is_simple(&self) -> bool {
        self.channel_type == ChannelType::Simple
    }

    pub fn members(&self) -> &[ChannelMember] {
        &self.members
    }

    pub fn member(&self, account_id: AccountId) -> Option<&ChannelMember> {
        self.members.iter().find(|m| m.account_id == account_id)
    }

    pub fn is_member(&self, account_id: AccountId) -> bool {
        self.member(account_id).is_some()
    }

    pub fn is_admin(&self, account_id: AccountId) -> bool {
        self.member(account_id).is_some_and(ChannelMember::is_admin)
    }

    /// The counterpart in a SIMPLE channel
    pub fn other_member(&self, account_id: AccountId) -> Option<&ChannelMember> {
        if !self.is_simple() || !self.is_member(account_id) {
            return None;
        }
        self.members.iter().find(|m| m.account_id != account_id)
    }

    /// Members whose approval is needed to delete the channel.
    ///
    /// GROUP: the admins. SIMPLE: both members (the creator's approval is implied
    /// by creating the request).
    pub fn delete_voters(&self) -> impl Iterator<Item = &ChannelMember> {
        let group = self.channel_type == ChannelType::Group;
        self.members.iter().filter(move |m| !group || m.is_admin())
    }

    /// Display name; SIMPLE channels fall back to the other member's name
    pub fn display_name(&self, viewer: AccountId) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.other_member(viewer)
            .map(|m| format!("{} {}", m.first_name, m.last_name).trim().to_string())
            .unwrap_or_else(|| "Direct Message".to_string())
    }
}
