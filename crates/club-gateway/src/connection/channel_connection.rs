//! A single live channel connection
//!
//! Connects on demand, decodes pushed frames and hands them to one handler in
//! receipt order, and queues sends without ever waiting. Failures are sticky:
//! nothing retries until `connect` is called again. A deletion signal ends the
//! stream cleanly and fires the deletion hook instead.

use std::sync::{Arc, Weak};

use club_core::{ChannelId, ChannelSignal, DomainError, Message, OutboundMessage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::{decode_inbound, encode_outbound, InboundFrame};
use crate::transport::ConnectionFactory;

/// Dispatch target for decoded messages
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Called once when the server reports the channel deleted
pub type DeletedHandler = Arc<dyn Fn() + Send + Sync>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Never connected, or the stream ended
    Disconnected,
    Connecting,
    Connected,
    /// Torn down; no further dispatch
    Closed,
}

/// Snapshot of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Sticky until the next successful `connect`
    pub failed: bool,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    sender: Option<mpsc::Sender<String>>,
    reader: Option<JoinHandle<()>>,
    /// Bumped on every connect so a stale reader cannot touch a newer stream
    generation: u64,
    failed: bool,
    last_error: Option<String>,
}

impl Inner {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            failed: self.failed,
            last_error: self.last_error.clone(),
        }
    }

    fn fail(&mut self, error: impl Into<String>) {
        self.failed = true;
        self.last_error = Some(error.into());
    }
}

/// Live connection for one channel view
pub struct ChannelConnection {
    channel_id: ChannelId,
    session_id: Uuid,
    factory: Arc<dyn ConnectionFactory>,
    /// Serializes `connect` so concurrent callers open at most one stream
    connect_lock: tokio::sync::Mutex<()>,
    inner: Mutex<Inner>,
    handler: Mutex<Option<MessageHandler>>,
    deleted: Mutex<Option<DeletedHandler>>,
}

impl ChannelConnection {
    pub fn new(channel_id: ChannelId, factory: Arc<dyn ConnectionFactory>) -> Arc<Self> {
        Arc::new(Self {
            channel_id,
            session_id: Uuid::new_v4(),
            factory,
            connect_lock: tokio::sync::Mutex::new(()),
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                sender: None,
                reader: None,
                generation: 0,
                failed: false,
                last_error: None,
            }),
            handler: Mutex::new(None),
            deleted: Mutex::new(None),
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Correlation id for logs
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_failed(&self) -> bool {
        self.inner.lock().failed
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Open the stream; a no-op while already connected
    ///
    /// A failure sets the sticky flag and is also returned.
    pub async fn connect(self: &Arc<Self>) -> Result<ConnectionStatus, DomainError> {
        let _guard = self.connect_lock.lock().await;

        let generation = {
            let mut inner = self.inner.lock();
            match inner.state {
                ConnectionState::Connected => return Ok(inner.status()),
                ConnectionState::Closed => return Err(DomainError::ChannelClosed(self.channel_id)),
                ConnectionState::Disconnected | ConnectionState::Connecting => {}
            }
            inner.state = ConnectionState::Connecting;
            inner.generation += 1;
            inner.generation
        };

        let opened = self.factory.open(self.channel_id).await;

        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Closed {
            return Err(DomainError::ChannelClosed(self.channel_id));
        }

        match opened {
            Ok(pair) => {
                let reader = tokio::spawn(read_loop(
                    Arc::downgrade(self),
                    generation,
                    pair.receiver,
                ));
                if let Some(stale) = inner.reader.replace(reader) {
                    stale.abort();
                }
                inner.sender = Some(pair.sender);
                inner.state = ConnectionState::Connected;
                inner.failed = false;
                inner.last_error = None;

                tracing::info!(
                    channel_id = %self.channel_id,
                    session_id = %self.session_id,
                    "Channel connection established"
                );
                Ok(inner.status())
            }
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                inner.fail(e.to_string());
                tracing::warn!(
                    channel_id = %self.channel_id,
                    session_id = %self.session_id,
                    error = %e,
                    "Channel connection failed"
                );
                Err(match e {
                    DomainError::ConnectionError(_) => e,
                    other => DomainError::ConnectionError(other.to_string()),
                })
            }
        }
    }

    /// Register the single dispatch target
    pub fn on_message<F>(&self, handler: F) -> Result<(), DomainError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        if self.state() == ConnectionState::Closed {
            return Err(DomainError::ChannelClosed(self.channel_id));
        }
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return Err(DomainError::HandlerAlreadyRegistered);
        }
        *slot = Some(Arc::new(handler));
        Ok(())
    }

    /// Register the single deletion hook
    pub fn on_channel_deleted<F>(&self, hook: F) -> Result<(), DomainError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.state() == ConnectionState::Closed {
            return Err(DomainError::ChannelClosed(self.channel_id));
        }
        let mut slot = self.deleted.lock();
        if slot.is_some() {
            return Err(DomainError::HandlerAlreadyRegistered);
        }
        *slot = Some(Arc::new(hook));
        Ok(())
    }

    /// Queue a message without waiting
    ///
    /// Returns `false` (and records the failure) when the connection is not
    /// open or its queue cannot take the frame.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        let frame = match encode_outbound(message) {
            Ok(frame) => frame,
            Err(e) => {
                self.inner.lock().fail(e.to_string());
                return false;
            }
        };

        let mut inner = self.inner.lock();
        let result = match (&inner.state, &inner.sender) {
            (ConnectionState::Connected, Some(sender)) => sender.try_send(frame),
            _ => {
                inner.fail("not connected");
                tracing::debug!(channel_id = %self.channel_id, "Send while not connected");
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                inner.fail("outbound queue full");
                tracing::warn!(channel_id = %self.channel_id, "Outbound queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                inner.state = ConnectionState::Disconnected;
                inner.sender = None;
                inner.fail("connection closed");
                tracing::warn!(channel_id = %self.channel_id, "Send on a closed stream");
                false
            }
        }
    }

    /// Tear down: stop reading, drop the outbound queue, forget the handler
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ConnectionState::Closed {
                return;
            }
            inner.state = ConnectionState::Closed;
            inner.sender = None;
            if let Some(reader) = inner.reader.take() {
                reader.abort();
            }
        }
        self.handler.lock().take();
        self.deleted.lock().take();
        tracing::debug!(
            channel_id = %self.channel_id,
            session_id = %self.session_id,
            "Channel connection closed"
        );
    }

    fn dispatch(&self, message: Message) {
        // Call outside the lock so the handler may touch this connection
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler(message),
            None => tracing::debug!(
                channel_id = %self.channel_id,
                message_id = %message.message_id,
                "No handler registered, message dropped"
            ),
        }
    }

    /// The server deleted the channel: the stream is over but nothing failed
    fn channel_deleted(&self, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != ConnectionState::Connected {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.sender = None;
            inner.reader = None;
        }
        tracing::info!(
            channel_id = %self.channel_id,
            session_id = %self.session_id,
            "Channel deleted by the server"
        );
        let hook = self.deleted.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn stream_ended(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return;
        }
        inner.state = ConnectionState::Disconnected;
        inner.sender = None;
        inner.reader = None;
        inner.fail("connection lost");
        tracing::warn!(
            channel_id = %self.channel_id,
            session_id = %self.session_id,
            "Channel stream ended"
        );
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.inner.get_mut().reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("channel_id", &self.channel_id)
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}

async fn read_loop(
    connection: Weak<ChannelConnection>,
    generation: u64,
    mut receiver: mpsc::Receiver<String>,
) {
    while let Some(frame) = receiver.recv().await {
        let Some(conn) = connection.upgrade() else {
            return;
        };
        match decode_inbound(&frame) {
            Ok(InboundFrame::Signal(ChannelSignal::ChannelDeleted { channel_id }))
                if channel_id == conn.channel_id =>
            {
                conn.channel_deleted(generation);
                return;
            }
            Ok(InboundFrame::Signal(signal)) => tracing::warn!(
                channel_id = %conn.channel_id,
                other = %signal.channel_id(),
                "Ignoring signal for another channel"
            ),
            Ok(InboundFrame::Message(message)) if message.channel_id == conn.channel_id => {
                conn.dispatch(message)
            }
            Ok(InboundFrame::Message(message)) => tracing::warn!(
                channel_id = %conn.channel_id,
                other = %message.channel_id,
                "Ignoring message for another channel"
            ),
            Err(e) => tracing::warn!(
                channel_id = %conn.channel_id,
                error = %e,
                "Skipping undecodable frame"
            ),
        }
    }

    if let Some(conn) = connection.upgrade() {
        conn.stream_ended(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryConnectionFactory;
    use chrono::Utc;
    use club_core::{AccountId, MessageId, MessageType};
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    fn message(id: i64, content: &str) -> Message {
        Message {
            message_id: MessageId::new(id),
            channel_id: ChannelId::new(1),
            sender_id: AccountId::new(7),
            sender_first_name: "Ben".to_string(),
            avatar_url: None,
            message_type: MessageType::Chat,
            message_content: content.to_string(),
            sent_at: Utc::now(),
            attachments: vec![],
        }
    }

    fn outbound(content: &str) -> OutboundMessage {
        OutboundMessage {
            sender_id: AccountId::new(5),
            channel_id: ChannelId::new(1),
            message_content: content.to_string(),
            attachments: vec![],
            sent_at: Utc::now(),
            message_type: MessageType::Chat,
            sender_first_name: "Ana".to_string(),
            avatar_url: None,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));

        assert!(conn.connect().await.unwrap().is_connected());
        assert!(conn.connect().await.unwrap().is_connected());
        assert_eq!(factory.open_count(ChannelId::new(1)), 1);
    }

    #[tokio::test]
    async fn test_dispatch_in_receipt_order_and_skip_garbage() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        let (tx, mut rx) = unbounded_channel();
        conn.on_message(move |m| {
            let _ = tx.send(m.message_id);
        })
        .unwrap();
        conn.connect().await.unwrap();

        // Later id first: no reordering on the client
        factory.push(&message(3, "third"));
        factory.push_raw(ChannelId::new(1), "{broken");
        factory.push(&message(1, "first"));

        assert_eq!(rx.recv().await, Some(MessageId::new(3)));
        assert_eq!(rx.recv().await, Some(MessageId::new(1)));
        assert!(!conn.is_failed());
    }

    #[tokio::test]
    async fn test_second_handler_rejected() {
        let conn = ChannelConnection::new(
            ChannelId::new(1),
            Arc::new(MemoryConnectionFactory::new()),
        );
        conn.on_message(|_| {}).unwrap();
        assert_eq!(
            conn.on_message(|_| {}),
            Err(DomainError::HandlerAlreadyRegistered)
        );
    }

    #[tokio::test]
    async fn test_send_reaches_transport() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        conn.connect().await.unwrap();

        assert!(conn.send(&outbound("hello")));
        wait_until(|| factory.sent(ChannelId::new(1)).len() == 1).await;
        assert_eq!(factory.sent(ChannelId::new(1))[0].message_content, "hello");
    }

    #[tokio::test]
    async fn test_send_while_disconnected_sets_failure() {
        let conn = ChannelConnection::new(
            ChannelId::new(1),
            Arc::new(MemoryConnectionFactory::new()),
        );
        assert!(!conn.send(&outbound("lost")));
        let status = conn.status();
        assert!(status.failed);
        assert_eq!(status.last_error.as_deref(), Some("not connected"));
    }

    #[tokio::test]
    async fn test_open_failure_is_sticky_until_reconnect() {
        let factory = MemoryConnectionFactory::new();
        factory.set_available(false);
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));

        assert!(matches!(
            conn.connect().await,
            Err(DomainError::ConnectionError(_))
        ));
        assert!(conn.is_failed());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        factory.set_available(true);
        let status = conn.connect().await.unwrap();
        assert!(status.is_connected());
        assert!(!status.failed);
    }

    #[tokio::test]
    async fn test_stream_end_marks_failure() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        conn.connect().await.unwrap();

        factory.disconnect(ChannelId::new(1));
        wait_until(|| conn.is_failed()).await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.last_error().as_deref(), Some("connection lost"));
    }

    #[tokio::test]
    async fn test_deletion_signal_fires_hook_without_failure() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        let (tx, mut rx) = unbounded_channel();
        conn.on_channel_deleted(move || {
            let _ = tx.send(());
        })
        .unwrap();
        conn.connect().await.unwrap();

        // A signal for some other channel is ignored
        factory.push_raw(ChannelId::new(1), r#"{"event":"CHANNEL_DELETED","channelId":2}"#);
        assert_eq!(
            factory.push_signal(&ChannelSignal::ChannelDeleted {
                channel_id: ChannelId::new(1)
            }),
            1
        );

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());
        wait_until(|| conn.state() == ConnectionState::Disconnected).await;
        assert!(!conn.is_failed());
        assert_eq!(conn.last_error(), None);
    }

    #[tokio::test]
    async fn test_second_deletion_hook_rejected() {
        let conn = ChannelConnection::new(
            ChannelId::new(1),
            Arc::new(MemoryConnectionFactory::new()),
        );
        conn.on_channel_deleted(|| {}).unwrap();
        assert_eq!(
            conn.on_channel_deleted(|| {}),
            Err(DomainError::HandlerAlreadyRegistered)
        );
    }

    #[tokio::test]
    async fn test_close_stops_dispatch() {
        let factory = MemoryConnectionFactory::new();
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        let (tx, mut rx) = unbounded_channel();
        conn.on_message(move |m| {
            let _ = tx.send(m.message_id);
        })
        .unwrap();
        conn.connect().await.unwrap();
        conn.close();

        factory.push(&message(1, "after close"));
        // Handler (and its sender) was dropped
        assert_eq!(rx.recv().await, None);
        assert!(matches!(
            conn.connect().await,
            Err(DomainError::ChannelClosed(_))
        ));
        assert!(!conn.send(&outbound("nope")));
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block() {
        let factory = MemoryConnectionFactory::new().with_outbound_buffer(1);
        let conn = ChannelConnection::new(ChannelId::new(1), Arc::new(factory.clone()));
        conn.connect().await.unwrap();

        // The hub drains concurrently; whatever it does, send must return at once
        let accepted = (0..64).filter(|i| conn.send(&outbound(&i.to_string()))).count();
        assert!(accepted >= 1);
        if accepted < 64 {
            assert_eq!(conn.last_error().as_deref(), Some("outbound queue full"));
        }
    }
}
