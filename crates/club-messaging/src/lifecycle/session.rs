//! One open channel view

use std::sync::{Arc, Weak};

use chrono::Utc;
use club_core::{
    Channel, DeleteRequest, DeleteRequestApi, DomainError, FileAttachment, HistoryApi, Message,
    MessageType, OutboundMessage, SystemEvent, SystemEventKind, Viewer, VoteOutcome, VoteStatus,
};
use club_gateway::{ChannelConnection, ConnectionStatus};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::view::{ChannelView, ViewParts};
use super::{ChannelEvent, LifecyclePhase};
use crate::block::BlockState;
use crate::proposal::DeleteProposalView;
use crate::timeline::MessageTimeline;

const EVENT_CAPACITY: usize = 256;

/// What the connection hands the pump, in receipt order
#[derive(Debug)]
enum Inbound {
    Message(Message),
    ChannelDeleted,
}

/// Everything the pump, fetches and user actions mutate
struct SessionState {
    timeline: MessageTimeline,
    block: BlockState,
    proposal: DeleteProposalView,
    read_marked: bool,
}

/// A channel view: its connection, timeline, block state and delete proposal
pub struct ChannelSession {
    channel: Channel,
    viewer: Viewer,
    connection: Arc<ChannelConnection>,
    history: Arc<dyn HistoryApi>,
    delete_requests: Arc<dyn DeleteRequestApi>,
    state: Mutex<SessionState>,
    phase: watch::Sender<LifecyclePhase>,
    events: broadcast::Sender<ChannelEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChannelSession {
    pub(super) fn new(
        channel: Channel,
        last_message: Option<&Message>,
        viewer: Viewer,
        connection: Arc<ChannelConnection>,
        history: Arc<dyn HistoryApi>,
        delete_requests: Arc<dyn DeleteRequestApi>,
        timeline: MessageTimeline,
    ) -> Arc<Self> {
        let block = BlockState::seed(&channel, last_message);
        let (phase, _) = watch::channel(LifecyclePhase::Loading);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Arc::new(Self {
            channel,
            viewer,
            connection,
            history,
            delete_requests,
            state: Mutex::new(SessionState {
                timeline,
                block,
                proposal: DeleteProposalView::new(),
                read_marked: false,
            }),
            phase,
            events,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Wire the connection to the pump and start the initial load
    pub(super) fn start(self: &Arc<Self>) -> Result<(), DomainError> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let deleted_tx = inbound_tx.clone();
        self.connection.on_message(move |message| {
            // Receiver gone means the session closed
            let _ = inbound_tx.send(Inbound::Message(message));
        })?;
        self.connection.on_channel_deleted(move || {
            let _ = deleted_tx.send(Inbound::ChannelDeleted);
        })?;

        let pump = tokio::spawn(pump(
            Arc::downgrade(self),
            inbound_rx,
            self.phase.subscribe(),
        ));
        let init = tokio::spawn(Arc::clone(self).initialize());
        self.tasks.lock().extend([pump, init]);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == LifecyclePhase::Closed
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Snapshot for rendering
    pub fn view(&self) -> ChannelView {
        let connection = self.connection.status();
        let state = self.state.lock();
        ChannelView::build(ViewParts {
            channel: &self.channel,
            viewer: &self.viewer,
            phase: self.phase(),
            timeline: &state.timeline,
            block: &state.block,
            proposal: &state.proposal,
            connection,
        })
    }

    /// Wait for the initial load to finish
    pub async fn ready(&self) -> Result<(), DomainError> {
        let mut phase = self.phase.subscribe();
        let reached = phase
            .wait_for(|p| *p != LifecyclePhase::Loading)
            .await
            .map(|p| *p);
        match reached {
            Ok(LifecyclePhase::Ready) => Ok(()),
            _ => Err(DomainError::ChannelClosed(self.channel.id)),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    async fn initialize(self: Arc<Self>) {
        let channel_id = self.channel.id;

        // Connect before the first fetch so nothing sent in between is missed;
        // overlap with the page is deduplicated
        match self.connection.connect().await {
            Ok(_) => {}
            Err(DomainError::ChannelClosed(_)) => return,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Opening without a live connection");
                self.emit(ChannelEvent::ConnectionFailed(e.to_string()));
            }
        }

        let limit = self.state.lock().timeline.fetch_limit();
        let Some(fetched) = self
            .until_closed(self.history.fetch_messages(channel_id, None, limit))
            .await
        else {
            return;
        };

        {
            let mut state = self.state.lock();
            if self.is_closed() {
                return;
            }
            match fetched {
                Ok(page) => {
                    for message in &page {
                        state.block.apply(message);
                    }
                    let added = state.timeline.apply_initial_page(page);
                    debug!(channel_id = %channel_id, added, "Initial page applied");
                }
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "Initial history fetch failed");
                    state.timeline.fail_initial(e.to_string());
                    drop(state);
                    self.emit(ChannelEvent::FetchFailed(e.to_string()));
                }
            }
        }

        // Best effort: the proposal refreshes again on the next DELETE narration
        let _ = self.refresh_delete_request().await;

        self.mark_read_once();

        let became_ready = self.phase.send_if_modified(|phase| {
            if *phase == LifecyclePhase::Loading {
                *phase = LifecyclePhase::Ready;
                true
            } else {
                false
            }
        });
        if became_ready {
            info!(channel_id = %channel_id, "Channel ready");
            self.emit(ChannelEvent::Ready);
        }
    }

    fn mark_read_once(&self) {
        if self.channel.read {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.read_marked {
                return;
            }
            state.read_marked = true;
        }

        let history = Arc::clone(&self.history);
        let channel_id = self.channel.id;
        let account_id = self.viewer.account_id;
        tokio::spawn(async move {
            if let Err(e) = history.mark_read(channel_id, account_id).await {
                warn!(channel_id = %channel_id, error = %e, "Mark as read failed");
            }
        });
    }

    /// Fetch the next older page. A no-op (`Ok(0)`) while another load is in
    /// flight or when the beginning has been reached.
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub async fn load_more(&self) -> Result<usize, DomainError> {
        self.ensure_ready()?;
        let (cursor, limit) = {
            let mut state = self.state.lock();
            let Some(cursor) = state.timeline.begin_load_more() else {
                return Ok(0);
            };
            (cursor, state.timeline.fetch_limit())
        };

        let Some(fetched) = self
            .until_closed(self.history.fetch_messages(self.channel.id, Some(cursor), limit))
            .await
        else {
            return Err(DomainError::ChannelClosed(self.channel.id));
        };

        let mut state = self.state.lock();
        if self.is_closed() {
            return Err(DomainError::ChannelClosed(self.channel.id));
        }
        match fetched {
            Ok(page) => {
                let block_changed = page
                    .iter()
                    .fold(false, |changed, m| state.block.apply(m) || changed);
                let added = state.timeline.finish_load_more(page);
                let has_more = state.timeline.has_more();
                let blocked = state.block.is_blocked();
                drop(state);

                self.emit(ChannelEvent::HistoryLoaded { added, has_more });
                if block_changed {
                    self.emit(ChannelEvent::BlockChanged { blocked });
                }
                Ok(added)
            }
            Err(e) => {
                state.timeline.abort_load_more(e.to_string());
                drop(state);
                warn!(error = %e, "Older history fetch failed, pagination halted");
                self.emit(ChannelEvent::FetchFailed(e.to_string()));
                Err(e)
            }
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    fn apply_inbound(self: &Arc<Self>, message: Message) {
        let (block_changed, blocked) = {
            let mut state = self.state.lock();
            if self.is_closed() {
                return;
            }
            if !state.timeline.append_live(message.clone()) {
                debug!(
                    channel_id = %self.channel.id,
                    message_id = %message.message_id,
                    "Duplicate live message dropped"
                );
                return;
            }
            let changed = state.block.apply(&message);
            (changed, state.block.is_blocked())
        };

        let is_delete_narration = message.message_type == MessageType::Delete;
        self.emit(ChannelEvent::MessageReceived(message));
        if block_changed {
            self.emit(ChannelEvent::BlockChanged { blocked });
        }
        if is_delete_narration {
            let session = Arc::clone(self);
            tokio::spawn(async move {
                let _ = session.refresh_delete_request().await;
            });
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a chat message
    #[instrument(skip(self, content, attachments), fields(channel_id = %self.channel.id))]
    pub fn send_chat(
        &self,
        content: impl Into<String>,
        attachments: Vec<FileAttachment>,
    ) -> Result<(), DomainError> {
        self.ensure_ready()?;
        let content = content.into();
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(DomainError::ValidationError("message is empty".to_string()));
        }
        {
            let state = self.state.lock();
            state.block.check_send(state.timeline.last())?;
        }
        self.transmit(&self.outbound(MessageType::Chat, content, attachments))
    }

    /// Block the other member; takes effect when the server echoes it back
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub fn block(&self) -> Result<(), DomainError> {
        self.ensure_ready()?;
        self.state.lock().block.check_block()?;
        let other = self.other_first_name();
        let event = SystemEvent::new(
            SystemEventKind::Block,
            self.viewer.account_id,
            format!("You blocked {other}"),
            format!("{} blocked you", self.viewer.first_name),
        );
        self.transmit(&self.outbound(MessageType::Block, event.encode()?, vec![]))
    }

    /// Lift a block placed by the viewer
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub fn unblock(&self) -> Result<(), DomainError> {
        self.ensure_ready()?;
        self.state
            .lock()
            .block
            .check_unblock(self.viewer.account_id)?;
        let other = self.other_first_name();
        let event = SystemEvent::new(
            SystemEventKind::Unblock,
            self.viewer.account_id,
            format!("You unblocked {other}"),
            format!("{} unblocked you", self.viewer.first_name),
        );
        self.transmit(&self.outbound(MessageType::Unblock, event.encode()?, vec![]))
    }

    fn other_first_name(&self) -> String {
        self.channel
            .other_member(self.viewer.account_id)
            .map(|m| m.first_name.clone())
            .unwrap_or_default()
    }

    fn outbound(
        &self,
        message_type: MessageType,
        message_content: String,
        attachments: Vec<FileAttachment>,
    ) -> OutboundMessage {
        OutboundMessage {
            sender_id: self.viewer.account_id,
            channel_id: self.channel.id,
            message_content,
            attachments,
            sent_at: Utc::now(),
            message_type,
            sender_first_name: self.viewer.first_name.clone(),
            avatar_url: self.viewer.picture_url.clone(),
        }
    }

    fn transmit(&self, message: &OutboundMessage) -> Result<(), DomainError> {
        if self.connection.send(message) {
            return Ok(());
        }
        let error = self
            .connection
            .last_error()
            .unwrap_or_else(|| "send failed".to_string());
        self.emit(ChannelEvent::ConnectionFailed(error.clone()));
        Err(DomainError::ConnectionError(error))
    }

    // =========================================================================
    // Delete proposal
    // =========================================================================

    /// Propose deleting the channel
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub async fn request_delete(&self) -> Result<DeleteRequest, DomainError> {
        self.ensure_ready()?;
        let created = self
            .delete_requests
            .create(
                self.channel.id,
                self.viewer.account_id,
                self.channel.channel_type(),
            )
            .await;

        match created {
            Ok(request) => {
                self.apply_snapshot(Some(request.clone()))?;
                Ok(request)
            }
            Err(e @ DomainError::DeleteRequestExists(_)) => {
                debug!("Delete request already pending, refreshing");
                let _ = self.refresh_delete_request().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Vote on the pending proposal.
    ///
    /// Returns `Ok(None)` when the proposal had already been resolved; the
    /// view then follows the next snapshot.
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub async fn vote(&self, status: VoteStatus) -> Result<Option<VoteOutcome>, DomainError> {
        self.ensure_ready()?;
        if status == VoteStatus::Pending {
            return Err(DomainError::ValidationError(
                "a vote must approve or deny".to_string(),
            ));
        }
        let account_id = self.viewer.account_id;

        let (request_id, tentative) = {
            let mut state = self.state.lock();
            let request_id = state.proposal.request_id().ok_or_else(|| {
                DomainError::ValidationError("no pending delete request".to_string())
            })?;
            state.proposal.record_tentative(account_id, status);
            (request_id, state.proposal.merged())
        };
        self.emit(ChannelEvent::DeleteRequestUpdated(tentative));

        let result = self
            .delete_requests
            .vote(request_id, self.channel.id, account_id, status)
            .await;

        match result {
            Ok(VoteOutcome::ChannelDeleted) => {
                info!(delete_request_id = %request_id, "Channel deleted by this vote");
                self.redirect_away();
                Ok(Some(VoteOutcome::ChannelDeleted))
            }
            Ok(outcome @ VoteOutcome::RequestDenied { .. }) => {
                self.apply_snapshot(None)?;
                Ok(Some(outcome))
            }
            Ok(VoteOutcome::VoteRecorded) => {
                let _ = self.refresh_delete_request().await;
                Ok(Some(VoteOutcome::VoteRecorded))
            }
            Err(DomainError::StaleVote(id)) => {
                warn!(delete_request_id = %id, "Vote arrived after resolution, ignored");
                self.state.lock().proposal.discard_tentative(account_id);
                let _ = self.refresh_delete_request().await;
                Ok(None)
            }
            Err(e) => {
                let merged = {
                    let mut state = self.state.lock();
                    state.proposal.discard_tentative(account_id);
                    state.proposal.merged()
                };
                self.emit(ChannelEvent::DeleteRequestUpdated(merged));
                Err(e)
            }
        }
    }

    /// Withdraw the viewer's own proposal
    pub async fn cancel_delete(&self) -> Result<Option<VoteOutcome>, DomainError> {
        if !self.state.lock().proposal.can_cancel(self.viewer.account_id) {
            return Err(DomainError::NotEligibleVoter {
                account_id: self.viewer.account_id,
            });
        }
        self.vote(VoteStatus::Denied).await
    }

    /// Pull the authoritative proposal from the delete-request API
    pub async fn refresh_delete_request(&self) -> Result<(), DomainError> {
        let fetched = self
            .until_closed(self.delete_requests.find_active(self.channel.id))
            .await
            .ok_or(DomainError::ChannelClosed(self.channel.id))?;

        match fetched {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(e) => {
                warn!(channel_id = %self.channel.id, error = %e, "Delete request refresh failed");
                Err(e)
            }
        }
    }

    fn apply_snapshot(&self, snapshot: Option<DeleteRequest>) -> Result<(), DomainError> {
        let merged = {
            let mut state = self.state.lock();
            if self.is_closed() {
                return Err(DomainError::ChannelClosed(self.channel.id));
            }
            state.proposal.apply_snapshot(snapshot);
            state.proposal.merged()
        };
        self.emit(ChannelEvent::DeleteRequestUpdated(merged));
        Ok(())
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Explicit retry after a connection failure
    #[instrument(skip(self), fields(channel_id = %self.channel.id))]
    pub async fn reconnect(&self) -> Result<ConnectionStatus, DomainError> {
        if self.is_closed() {
            return Err(DomainError::ChannelClosed(self.channel.id));
        }
        match self.connection.connect().await {
            Ok(status) => {
                self.emit(ChannelEvent::ConnectionRestored);
                Ok(status)
            }
            Err(e) => {
                self.emit(ChannelEvent::ConnectionFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Tear the view down. In-flight fetches are abandoned without touching
    /// the timeline.
    pub fn close(&self) {
        if self.mark_closed() {
            self.teardown();
        }
    }

    /// The channel no longer exists: leave the view exactly once, whichever of
    /// the deciding vote or the server signal gets here first
    fn redirect_away(&self) {
        if !self.mark_closed() {
            return;
        }
        self.state.lock().proposal.clear();
        self.emit(ChannelEvent::Redirect);
        self.teardown();
    }

    fn mark_closed(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == LifecyclePhase::Closed {
                false
            } else {
                *phase = LifecyclePhase::Closed;
                true
            }
        })
    }

    fn teardown(&self) {
        self.connection.close();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!(channel_id = %self.channel.id, "Channel closed");
        self.emit(ChannelEvent::Closed);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_ready(&self) -> Result<(), DomainError> {
        match self.phase() {
            LifecyclePhase::Ready => Ok(()),
            LifecyclePhase::Loading => Err(DomainError::ChannelLoading(self.channel.id)),
            LifecyclePhase::Closed => Err(DomainError::ChannelClosed(self.channel.id)),
        }
    }

    /// Run `future` unless the session closes first
    async fn until_closed<F: std::future::Future>(&self, future: F) -> Option<F::Output> {
        let mut phase = self.phase.subscribe();
        tokio::select! {
            () = wait_closed(&mut phase) => None,
            output = future => Some(output),
        }
    }

    fn emit(&self, event: ChannelEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        self.connection.close();
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("channel_id", &self.channel.id)
            .field("viewer", &self.viewer.account_id)
            .field("phase", &self.phase())
            .finish()
    }
}

async fn wait_closed(phase: &mut watch::Receiver<LifecyclePhase>) {
    let _ = phase.wait_for(|p| *p == LifecyclePhase::Closed).await;
}

/// Single writer for live messages
async fn pump(
    session: Weak<ChannelSession>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    mut phase: watch::Receiver<LifecyclePhase>,
) {
    loop {
        tokio::select! {
            () = wait_closed(&mut phase) => break,
            next = inbound.recv() => {
                let Some(next) = next else { break };
                let Some(session) = session.upgrade() else { break };
                match next {
                    Inbound::Message(message) => session.apply_inbound(message),
                    Inbound::ChannelDeleted => {
                        info!(channel_id = %session.channel.id, "Channel deleted elsewhere");
                        session.redirect_away();
                        break;
                    }
                }
            }
        }
    }
}
