//! Entry point holding the injected collaborators

use std::sync::Arc;

use club_common::{AppConfig, MessagingConfig};
use club_core::{DeleteRequestApi, DomainError, HistoryApi, IdentityProvider};
use club_gateway::{ChannelConnection, ConnectionFactory, WsConnectionFactory};

use super::session::ChannelSession;
use super::ChannelSummary;
use crate::api::{HttpDeleteRequestApi, HttpHistoryApi};
use crate::timeline::MessageTimeline;

/// Opens channel sessions
pub struct Messenger {
    identity: Arc<dyn IdentityProvider>,
    connections: Arc<dyn ConnectionFactory>,
    history: Arc<dyn HistoryApi>,
    delete_requests: Arc<dyn DeleteRequestApi>,
    config: MessagingConfig,
}

impl Messenger {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        connections: Arc<dyn ConnectionFactory>,
        history: Arc<dyn HistoryApi>,
        delete_requests: Arc<dyn DeleteRequestApi>,
        config: MessagingConfig,
    ) -> Self {
        Self {
            identity,
            connections,
            history,
            delete_requests,
            config,
        }
    }

    /// WebSocket transport and HTTP clients built from configuration
    pub fn from_config(identity: Arc<dyn IdentityProvider>, config: &AppConfig) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            identity,
            Arc::new(WsConnectionFactory::new(config.gateway.clone())),
            Arc::new(HttpHistoryApi::with_client(
                client.clone(),
                config.api.base_url.clone(),
            )),
            Arc::new(HttpDeleteRequestApi::with_client(
                client,
                config.api.base_url.clone(),
            )),
            config.messaging.clone(),
        )
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Begin opening a channel and return at once, still `Loading`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(&self, summary: ChannelSummary) -> Result<Arc<ChannelSession>, DomainError> {
        let viewer = self.identity.current();
        let channel_id = summary.channel.id;
        if !summary.channel.is_member(viewer.account_id) {
            return Err(DomainError::NotAMember {
                channel_id,
                account_id: viewer.account_id,
            });
        }

        let connection = ChannelConnection::new(channel_id, Arc::clone(&self.connections));
        tracing::debug!(
            channel_id = %channel_id,
            session_id = %connection.session_id(),
            "Opening channel"
        );

        let session = ChannelSession::new(
            summary.channel,
            summary.last_message.as_ref(),
            viewer,
            connection,
            Arc::clone(&self.history),
            Arc::clone(&self.delete_requests),
            MessageTimeline::from_config(&self.config),
        );
        session.start()?;
        Ok(session)
    }

    /// Open a channel and wait until it is `Ready`
    pub async fn open(&self, summary: ChannelSummary) -> Result<Arc<ChannelSession>, DomainError> {
        let session = self.start(summary)?;
        session.ready().await?;
        Ok(session)
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
