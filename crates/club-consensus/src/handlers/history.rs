//! Message history and read flag

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use club_core::{AccountId, Message};
use serde::Deserialize;

use super::parse_channel_id;
use crate::response::{ApiError, ApiResult, NoContent};
use crate::state::AppState;

/// Upper bound on a single history page
pub const MAX_PAGE_SIZE: usize = 100;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Only messages strictly older than this
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    pub account_id: AccountId,
}

/// Newest-first page of history
///
/// GET /channel/{channel_id}/messages?before={cursor}&limit={n}
pub async fn get_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Message>>> {
    let channel_id = parse_channel_id(&channel_id)?;
    let Query(query) = query.map_err(|e| ApiError::invalid_query(e.body_text()))?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ApiError::invalid_query(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let page = state.store().history(channel_id, query.before, limit)?;
    Ok(Json(page))
}

/// Mark the channel read for one member
///
/// POST /channel/{channel_id}/read?accountId={id}
pub async fn mark_read(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    query: Result<Query<ReadQuery>, QueryRejection>,
) -> ApiResult<NoContent> {
    let channel_id = parse_channel_id(&channel_id)?;
    let Query(query) = query.map_err(|e| ApiError::invalid_query(e.body_text()))?;

    state.store().mark_read(channel_id, query.account_id)?;
    tracing::debug!(channel_id = %channel_id, account_id = %query.account_id, "Channel marked read");
    Ok(NoContent)
}
