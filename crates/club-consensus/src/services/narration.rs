//! DELETE system-message texts

use club_core::{AccountId, SystemEvent, SystemEventKind};

/// What happened to a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteNarration {
    Requested,
    Cancelled,
    Denied,
}

impl DeleteNarration {
    /// Build the event told by `actor_id`, named `actor_name` to others
    pub fn event(self, actor_id: AccountId, actor_name: &str) -> SystemEvent {
        let (actor_text, others_text) = match self {
            Self::Requested => (
                "You requested to delete this chat".to_string(),
                format!("{actor_name} requested to delete this chat"),
            ),
            Self::Cancelled => (
                "You cancelled the delete request".to_string(),
                format!("{actor_name} cancelled the delete request"),
            ),
            Self::Denied => (
                "You declined to delete this chat".to_string(),
                format!("{actor_name} declined to delete this chat"),
            ),
        };
        SystemEvent::new(SystemEventKind::Delete, actor_id, actor_text, others_text)
    }
}
