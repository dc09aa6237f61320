//! Delete-request client

use async_trait::async_trait;
use club_common::ApiConfig;
use club_core::{
    AccountId, ChannelId, ChannelType, DeleteRequest, DeleteRequestApi, DeleteRequestId,
    RepoResult, VoteOutcome, VoteStatus,
};
use reqwest::Client;
use serde::Serialize;

use super::{decode, join, CallContext};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    creator_id: AccountId,
    channel_type: ChannelType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteBody {
    channel_id: ChannelId,
    account_id: AccountId,
    status: VoteStatus,
}

/// [`DeleteRequestApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpDeleteRequestApi {
    client: Client,
    base_url: String,
}

impl HttpDeleteRequestApi {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_client(Client::new(), &config.base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DeleteRequestApi for HttpDeleteRequestApi {
    async fn create(
        &self,
        channel_id: ChannelId,
        creator_id: AccountId,
        channel_type: ChannelType,
    ) -> RepoResult<DeleteRequest> {
        let url = join(&self.base_url, &format!("channel/{channel_id}/delete-request"));
        let ctx = CallContext::channel(channel_id).account(creator_id);
        let response = self
            .client
            .post(&url)
            .json(&CreateBody {
                creator_id,
                channel_type,
            })
            .send()
            .await
            .map_err(|e| ctx.into_domain(e.into()))?;
        decode(response).await.map_err(|e| ctx.into_domain(e))
    }

    async fn vote(
        &self,
        delete_request_id: DeleteRequestId,
        channel_id: ChannelId,
        account_id: AccountId,
        status: VoteStatus,
    ) -> RepoResult<VoteOutcome> {
        let url = join(&self.base_url, &format!("delete-request/{delete_request_id}/vote"));
        let ctx = CallContext::channel(channel_id)
            .account(account_id)
            .request(delete_request_id);
        let response = self
            .client
            .post(&url)
            .json(&VoteBody {
                channel_id,
                account_id,
                status,
            })
            .send()
            .await
            .map_err(|e| ctx.into_domain(e.into()))?;
        decode(response).await.map_err(|e| ctx.into_domain(e))
    }

    async fn find_active(&self, channel_id: ChannelId) -> RepoResult<Option<DeleteRequest>> {
        let url = join(&self.base_url, &format!("channel/{channel_id}/delete-request"));
        let ctx = CallContext::channel(channel_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ctx.into_domain(e.into()))?;
        decode(response).await.map_err(|e| ctx.into_domain(e))
    }
}
