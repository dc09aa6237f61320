//! Route handlers

pub mod delete_requests;
pub mod health;
pub mod history;
pub mod live;

use club_core::{ChannelId, DeleteRequestId};

use crate::response::ApiError;

pub(crate) fn parse_channel_id(raw: &str) -> Result<ChannelId, ApiError> {
    ChannelId::parse(raw).map_err(|_| ApiError::invalid_path("Invalid channel_id format"))
}

pub(crate) fn parse_delete_request_id(raw: &str) -> Result<DeleteRequestId, ApiError> {
    DeleteRequestId::parse(raw)
        .map_err(|_| ApiError::invalid_path("Invalid delete_request_id format"))
}
