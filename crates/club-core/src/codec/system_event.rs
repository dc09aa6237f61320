//! System event encoding
//!
//! Wire format: `<TAG>*<actorId>*<textForActor>*<textForOthers>`.
//! The last segment may itself contain `*`; the actor text may not.

use std::fmt;

use crate::entities::{Message, MessageType};
use crate::error::DomainError;
use crate::value_objects::AccountId;

const DELIMITER: char = '*';

/// Shown in place of a system message whose payload cannot be decoded
pub const FALLBACK_TEXT: &str = "This message could not be displayed";

/// Kind of state change a system message narrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEventKind {
    Join,
    Block,
    Unblock,
    Leave,
    Update,
    Delete,
}

impl SystemEventKind {
    /// Literal tag written as the first segment
    pub fn tag(self) -> &'static str {
        self.message_type().as_str()
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "JOIN" => Self::Join,
            "BLOCK" => Self::Block,
            "UNBLOCK" => Self::Unblock,
            "LEAVE" => Self::Leave,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => return None,
        })
    }

    pub fn message_type(self) -> MessageType {
        match self {
            Self::Join => MessageType::Join,
            Self::Block => MessageType::Block,
            Self::Unblock => MessageType::Unblock,
            Self::Leave => MessageType::Leave,
            Self::Update => MessageType::Update,
            Self::Delete => MessageType::Delete,
        }
    }
}

impl TryFrom<MessageType> for SystemEventKind {
    type Error = DomainError;

    fn try_from(value: MessageType) -> Result<Self, Self::Error> {
        Ok(match value {
            MessageType::Join => Self::Join,
            MessageType::Block => Self::Block,
            MessageType::Unblock => Self::Unblock,
            MessageType::Leave => Self::Leave,
            MessageType::Update => Self::Update,
            MessageType::Delete => Self::Delete,
            MessageType::Chat => {
                return Err(DomainError::MalformedMessage(
                    "chat messages carry no system event".to_string(),
                ))
            }
        })
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Who did it, and how to describe it to them and to everyone else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub actor_id: AccountId,
    pub actor_text: String,
    pub others_text: String,
}

/// A decoded system message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    Join(Narration),
    Block(Narration),
    Unblock(Narration),
    Leave(Narration),
    Update(Narration),
    Delete(Narration),
}

impl SystemEvent {
    pub fn new(
        kind: SystemEventKind,
        actor_id: AccountId,
        actor_text: impl Into<String>,
        others_text: impl Into<String>,
    ) -> Self {
        let narration = Narration {
            actor_id,
            actor_text: actor_text.into(),
            others_text: others_text.into(),
        };
        match kind {
            SystemEventKind::Join => Self::Join(narration),
            SystemEventKind::Block => Self::Block(narration),
            SystemEventKind::Unblock => Self::Unblock(narration),
            SystemEventKind::Leave => Self::Leave(narration),
            SystemEventKind::Update => Self::Update(narration),
            SystemEventKind::Delete => Self::Delete(narration),
        }
    }

    pub fn kind(&self) -> SystemEventKind {
        match self {
            Self::Join(_) => SystemEventKind::Join,
            Self::Block(_) => SystemEventKind::Block,
            Self::Unblock(_) => SystemEventKind::Unblock,
            Self::Leave(_) => SystemEventKind::Leave,
            Self::Update(_) => SystemEventKind::Update,
            Self::Delete(_) => SystemEventKind::Delete,
        }
    }

    pub fn narration(&self) -> &Narration {
        match self {
            Self::Join(n)
            | Self::Block(n)
            | Self::Unblock(n)
            | Self::Leave(n)
            | Self::Update(n)
            | Self::Delete(n) => n,
        }
    }

    #[inline]
    pub fn actor_id(&self) -> AccountId {
        self.narration().actor_id
    }

    /// Message type this event travels as
    pub fn message_type(&self) -> MessageType {
        self.kind().message_type()
    }

    /// Serialize into `messageContent`
    pub fn encode(&self) -> Result<String, DomainError> {
        let n = self.narration();
        if n.actor_text.contains(DELIMITER) {
            return Err(DomainError::MalformedMessage(format!(
                "actor text may not contain '{DELIMITER}'"
            )));
        }
        Ok(format!(
            "{tag}{d}{actor}{d}{actor_text}{d}{others_text}",
            tag = self.kind().tag(),
            d = DELIMITER,
            actor = n.actor_id,
            actor_text = n.actor_text,
            others_text = n.others_text,
        ))
    }

    /// Parse `messageContent`
    pub fn decode(content: &str) -> Result<Self, DomainError> {
        let mut segments = content.splitn(4, DELIMITER);
        let (Some(tag), Some(actor), Some(actor_text), Some(others_text)) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(DomainError::MalformedMessage(format!(
                "expected 4 segments in {content:?}"
            )));
        };

        let kind = SystemEventKind::from_tag(tag)
            .ok_or_else(|| DomainError::MalformedMessage(format!("unknown tag {tag:?}")))?;
        let actor_id = AccountId::parse(actor)
            .map_err(|_| DomainError::MalformedMessage(format!("invalid actor id {actor:?}")))?;

        Ok(Self::new(kind, actor_id, actor_text, others_text))
    }

    /// Parse the payload of a system message, checking it matches the message type
    pub fn from_message(message: &Message) -> Result<Self, DomainError> {
        let expected = SystemEventKind::try_from(message.message_type)?;
        let event = Self::decode(&message.message_content)?;
        if event.kind() != expected {
            return Err(DomainError::MalformedMessage(format!(
                "{} message carries a {} payload",
                expected,
                event.kind()
            )));
        }
        Ok(event)
    }

    /// Text for `viewer` of a message sent by `sender`
    pub fn text_for(&self, viewer: AccountId, sender: AccountId) -> &str {
        let n = self.narration();
        if sender == viewer {
            &n.actor_text
        } else {
            &n.others_text
        }
    }

    /// Decode `content` and pick the text for `viewer`
    pub fn display_text(
        content: &str,
        viewer: AccountId,
        sender: AccountId,
    ) -> Result<String, DomainError> {
        Self::decode(content).map(|event| event.text_for(viewer, sender).to_string())
    }
}

/// Text to show `viewer` for `message`.
///
/// Chat content is returned verbatim. For the JOIN that opens a channel the
/// creator (the encoded actor) sees the actor text even when the server stamped
/// another sender on it.
pub fn render_text(
    message: &Message,
    viewer: AccountId,
    is_first_message: bool,
) -> Result<String, DomainError> {
    if message.message_type == MessageType::Chat {
        return Ok(message.message_content.clone());
    }

    let event = SystemEvent::from_message(message)?;
    if is_first_message && event.kind() == SystemEventKind::Join && event.actor_id() == viewer {
        return Ok(event.narration().actor_text.clone());
    }
    Ok(event.text_for(viewer, message.sender_id).to_string())
}
