//! Render-ready snapshot of a session

use club_core::{
    render_text, AccountId, Channel, ChannelId, DeleteRequest, Message, Viewer, FALLBACK_TEXT,
};
use club_gateway::ConnectionStatus;
use serde::Serialize;

use super::LifecyclePhase;
use crate::block::BlockState;
use crate::proposal::DeleteProposalView;
use crate::timeline::MessageTimeline;

/// One timeline row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub message: Message,
    /// Chat content, or the narration picked for this viewer
    pub text: String,
    pub show_separator: bool,
    pub is_own: bool,
}

/// Everything a channel screen draws
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub channel_id: ChannelId,
    pub title: String,
    pub phase: LifecyclePhase,
    pub messages: Vec<DisplayMessage>,
    pub has_more: bool,
    pub loading_more: bool,
    pub blocked: bool,
    pub blocker: Option<AccountId>,
    pub composer_enabled: bool,
    pub can_unblock: bool,
    /// Persistent banner until an explicit reconnect succeeds
    pub connection_failed: bool,
    pub connection_error: Option<String>,
    pub fetch_error: Option<String>,
    pub delete_request: Option<DeleteRequest>,
    pub can_vote: bool,
    pub can_cancel_delete: bool,
    pub can_request_delete: bool,
}

pub(super) struct ViewParts<'a> {
    pub channel: &'a Channel,
    pub viewer: &'a Viewer,
    pub phase: LifecyclePhase,
    pub timeline: &'a MessageTimeline,
    pub block: &'a BlockState,
    pub proposal: &'a DeleteProposalView,
    pub connection: ConnectionStatus,
}

impl ChannelView {
    pub(super) fn build(parts: ViewParts<'_>) -> Self {
        let viewer = parts.viewer.account_id;
        let timeline = parts.timeline;

        let messages = timeline
            .messages()
            .iter()
            .enumerate()
            .map(|(index, message)| DisplayMessage {
                text: display_text(message, viewer, timeline.is_channel_start(index)),
                show_separator: timeline.should_show_timestamp_separator(index),
                is_own: message.sender_id == viewer,
                message: message.clone(),
            })
            .collect();

        Self {
            channel_id: parts.channel.id,
            title: parts.channel.display_name(viewer),
            phase: parts.phase,
            messages,
            has_more: timeline.has_more(),
            loading_more: timeline.is_loading_more(),
            blocked: parts.block.is_blocked(),
            blocker: parts.block.blocker(),
            composer_enabled: parts.phase == LifecyclePhase::Ready
                && parts.block.composer_enabled(timeline.last()),
            can_unblock: parts.block.check_unblock(viewer).is_ok(),
            connection_failed: parts.connection.failed,
            connection_error: parts.connection.last_error,
            fetch_error: timeline.fetch_error().map(str::to_string),
            delete_request: parts.proposal.merged(),
            can_vote: parts.proposal.can_vote(viewer),
            can_cancel_delete: parts.proposal.can_cancel(viewer),
            can_request_delete: parts.proposal.can_request(parts.channel, viewer),
        }
    }
}

fn display_text(message: &Message, viewer: AccountId, is_channel_start: bool) -> String {
    render_text(message, viewer, is_channel_start).unwrap_or_else(|e| {
        tracing::warn!(
            channel_id = %message.channel_id,
            message_id = %message.message_id,
            error = %e,
            "Rendering fallback for undecodable system message"
        );
        FALLBACK_TEXT.to_string()
    })
}
