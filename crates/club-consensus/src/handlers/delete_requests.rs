//! Delete-request handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use club_core::{AccountId, ChannelId, ChannelType, DeleteRequest, VoteOutcome, VoteStatus};
use serde::{Deserialize, Serialize};

use super::{parse_channel_id, parse_delete_request_id};
use crate::response::{ApiError, ApiResult, Created};
use crate::state::AppState;

/// Body of a create call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeleteRequest {
    pub creator_id: AccountId,
    pub channel_type: ChannelType,
}

/// Body of a vote call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub channel_id: ChannelId,
    pub account_id: AccountId,
    pub status: VoteStatus,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| ApiError::InvalidBody(e.body_text()))
}

/// Open a delete request
///
/// POST /channel/{channel_id}/delete-request
pub async fn create_delete_request(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    payload: Result<Json<CreateDeleteRequest>, JsonRejection>,
) -> ApiResult<Created<Json<DeleteRequest>>> {
    let channel_id = parse_channel_id(&channel_id)?;
    let request = body(payload)?;

    let created = state
        .consensus()
        .create_request(channel_id, request.creator_id, request.channel_type)
        .await?;
    Ok(Created(Json(created)))
}

/// The pending request, or `null`
///
/// GET /channel/{channel_id}/delete-request
pub async fn get_active_delete_request(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> ApiResult<Json<Option<DeleteRequest>>> {
    let channel_id = parse_channel_id(&channel_id)?;
    Ok(Json(state.consensus().active_request(channel_id)))
}

/// Cast a vote
///
/// POST /delete-request/{delete_request_id}/vote
pub async fn vote(
    State(state): State<AppState>,
    Path(delete_request_id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteOutcome>> {
    let delete_request_id = parse_delete_request_id(&delete_request_id)?;
    let request = body(payload)?;

    let outcome = state
        .consensus()
        .cast_vote(
            delete_request_id,
            request.channel_id,
            request.account_id,
            request.status,
        )
        .await?;
    Ok(Json(outcome))
}
