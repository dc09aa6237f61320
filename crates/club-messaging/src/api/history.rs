//! History and read-flag client

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use club_common::ApiConfig;
use club_core::{AccountId, ChannelId, HistoryApi, Message, RepoResult};
use reqwest::Client;

use super::{check, decode, join, CallContext};

/// [`HistoryApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpHistoryApi {
    client: Client,
    base_url: String,
}

impl HttpHistoryApi {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_client(Client::new(), &config.base_url)
    }

    /// Share a connection pool with other clients
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// RFC 3339 with as many fractional digits as the instant needs, so the
/// cursor matches the server's timestamp exactly
fn cursor_param(before: DateTime<Utc>) -> String {
    before.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[async_trait]
impl HistoryApi for HttpHistoryApi {
    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> RepoResult<Vec<Message>> {
        let url = join(&self.base_url, &format!("channel/{channel_id}/messages"));
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", cursor_param(before)));
        }

        let ctx = CallContext::channel(channel_id);
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ctx.into_domain(e.into()))?;
        let page: Vec<Message> = decode(response).await.map_err(|e| ctx.into_domain(e))?;

        tracing::debug!(channel_id = %channel_id, count = page.len(), "Fetched history page");
        Ok(page)
    }

    async fn mark_read(&self, channel_id: ChannelId, account_id: AccountId) -> RepoResult<()> {
        let url = join(&self.base_url, &format!("channel/{channel_id}/read"));
        let ctx = CallContext::channel(channel_id).account(account_id);
        let response = self
            .client
            .post(&url)
            .query(&[("accountId", account_id.to_string())])
            .send()
            .await
            .map_err(|e| ctx.into_domain(e.into()))?;
        check(response).await.map_err(|e| ctx.into_domain(e))?;
        Ok(())
    }
}
