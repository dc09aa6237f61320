//! REST clients for the history and delete-request APIs
//!
//! Failures come back as the server's `ErrorResponse` body; its code is mapped
//! back to the matching [`DomainError`] using the ids the call was made with.

mod delete_requests;
mod history;

pub use delete_requests::HttpDeleteRequestApi;
pub use history::HttpHistoryApi;

use club_common::ErrorResponse;
use club_core::{AccountId, ChannelId, DeleteRequestId, DomainError};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure talking to the REST API
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered {status}: {}", .body.as_ref().map_or("<no body>", |b| b.message.as_str()))]
    Status {
        status: StatusCode,
        body: Option<ErrorResponse>,
    },
}

/// Ids a call was made with, used to rebuild typed errors
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallContext {
    pub channel_id: ChannelId,
    pub account_id: Option<AccountId>,
    pub delete_request_id: Option<DeleteRequestId>,
}

impl CallContext {
    pub(crate) fn channel(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            account_id: None,
            delete_request_id: None,
        }
    }

    pub(crate) fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub(crate) fn request(mut self, delete_request_id: DeleteRequestId) -> Self {
        self.delete_request_id = Some(delete_request_id);
        self
    }

    /// Map a client failure onto the domain taxonomy
    pub(crate) fn into_domain(self, error: ApiClientError) -> DomainError {
        let (status, body) = match error {
            ApiClientError::Transport(e) => return DomainError::FetchError(e.to_string()),
            ApiClientError::Status { status, body } => (status, body),
        };
        let Some(body) = body else {
            return DomainError::FetchError(format!("server answered {status}"));
        };

        let account_id = self.account_id.unwrap_or_default();
        let request_id = self.delete_request_id.unwrap_or_default();
        match body.code.as_str() {
            "UNKNOWN_CHANNEL" => DomainError::ChannelNotFound(self.channel_id),
            "UNKNOWN_DELETE_REQUEST" => DomainError::DeleteRequestNotFound(request_id),
            "NOT_A_MEMBER" => DomainError::NotAMember {
                channel_id: self.channel_id,
                account_id,
            },
            "NOT_ELIGIBLE_VOTER" => DomainError::NotEligibleVoter { account_id },
            "DELETE_REQUEST_EXISTS" => DomainError::DeleteRequestExists(self.channel_id),
            "STALE_VOTE" => DomainError::StaleVote(request_id),
            "CHANNEL_BLOCKED" => DomainError::ChannelBlocked(self.channel_id),
            "BLOCKING_UNSUPPORTED" => DomainError::BlockingUnsupported(self.channel_id),
            "NO_ELIGIBLE_VOTERS" => DomainError::NoEligibleVoters(self.channel_id),
            code => DomainError::from_code(code, body.message.clone()).unwrap_or_else(|| {
                if status.is_client_error() {
                    DomainError::ValidationError(body.message)
                } else {
                    DomainError::FetchError(body.message)
                }
            }),
        }
    }
}

/// Decode a JSON body, or turn a non-2xx answer into [`ApiClientError::Status`]
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiClientError> {
    let response = check(response).await?;
    Ok(response.json().await?)
}

pub(crate) async fn check(response: Response) -> Result<Response, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorResponse>().await.ok();
    Err(ApiClientError::Status { status, body })
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
