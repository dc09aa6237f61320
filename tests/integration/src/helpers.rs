//! Test helpers for integration tests
//!
//! Provides a server spawned in-process, HTTP shortcuts, and a messenger wired
//! to the server's REST and live-stream endpoints.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use club_common::{GatewayConfig, MessagingConfig};
use club_consensus::{create_app, AppState, InMemoryChannelStore};
use club_core::{Channel, ChannelId, Message, Viewer};
use club_gateway::WsConnectionFactory;
use club_messaging::{ChannelEvent, HttpDeleteRequestApi, HttpHistoryApi, Messenger};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::fixtures::StaticIdentity;

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: AppState,
    store: Arc<InMemoryChannelStore>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server on an ephemeral port with an empty store
    pub async fn start() -> Result<Self> {
        let store = Arc::new(InMemoryChannelStore::new());
        let state = AppState::new(store.clone());
        let app = create_app(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            store,
            _handle: handle,
        })
    }

    pub fn store(&self) -> &InMemoryChannelStore {
        &self.store
    }

    /// Register a channel with some history
    pub fn seed_channel(&self, channel: Channel, history: Vec<Message>) -> Result<Vec<Message>> {
        let channel_id = channel.id;
        self.store.insert(channel);
        Ok(self.store.seed(channel_id, history)?)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            url_template: format!("ws://{}/ws/channel/{{channel_id}}", self.addr),
            ..GatewayConfig::default()
        }
    }

    pub fn history_api(&self) -> HttpHistoryApi {
        HttpHistoryApi::with_client(self.client.clone(), self.base_url())
    }

    pub fn delete_request_api(&self) -> HttpDeleteRequestApi {
        HttpDeleteRequestApi::with_client(self.client.clone(), self.base_url())
    }

    /// A messenger for `viewer` talking to this server over HTTP and WebSocket
    pub fn messenger(&self, viewer: Viewer) -> Messenger {
        Messenger::new(
            Arc::new(StaticIdentity(viewer)),
            Arc::new(WsConnectionFactory::new(self.gateway_config())),
            Arc::new(self.history_api()),
            Arc::new(self.delete_request_api()),
            MessagingConfig::default(),
        )
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

/// Wait for the first event matching `matches`
pub async fn next_event(
    events: &mut broadcast::Receiver<ChannelEvent>,
    mut matches: impl FnMut(&ChannelEvent) -> bool,
) -> Result<ChannelEvent> {
    within(async {
        loop {
            let event = events.recv().await?;
            if matches(&event) {
                return Ok(event);
            }
        }
    })
    .await?
}

/// Poll `condition` until it holds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> Result<()> {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

async fn within<F: Future>(future: F) -> Result<F::Output> {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .map_err(|_| anyhow::anyhow!("timed out"))
}

/// Messages stored for a channel, oldest first
pub fn stored(server: &TestServer, channel_id: ChannelId) -> Result<Vec<Message>> {
    let mut page = server.store().history(channel_id, None, 100)?;
    page.reverse();
    Ok(page)
}

/// Let freshly upgraded live streams subscribe before traffic starts
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
