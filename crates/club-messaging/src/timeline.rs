//! Message timeline
//!
//! Paginated history and live pushes merged into one sequence, sorted by
//! `(sent_at, message_id)` with no duplicate ids. History pages arrive
//! newest-first and extend the sequence backwards; live messages usually land
//! at the tail but are inserted in order when they race an older page.
//!
//! The timeline performs no I/O. The lifecycle fetches pages and feeds them in
//! through [`MessageTimeline::apply_initial_page`] and the
//! `begin_load_more`/`finish_load_more` pair.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use club_common::MessagingConfig;
use club_core::{Message, MessageId};

#[derive(Debug, Clone)]
pub struct MessageTimeline {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    /// Oldest `sent_at` of any fetched page
    cursor: Option<DateTime<Utc>>,
    has_more: bool,
    loading_more: bool,
    fetch_error: Option<String>,
    fetch_limit: usize,
    separator_gap: Duration,
}

impl Default for MessageTimeline {
    fn default() -> Self {
        Self::from_config(&MessagingConfig::default())
    }
}

impl MessageTimeline {
    pub fn new(fetch_limit: usize, separator_minutes: i64) -> Self {
        Self {
            messages: Vec::new(),
            ids: HashSet::new(),
            cursor: None,
            has_more: false,
            loading_more: false,
            fetch_error: None,
            fetch_limit,
            separator_gap: Duration::minutes(separator_minutes),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.fetch_limit, config.separator_minutes)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.ids.contains(&message_id)
    }

    #[inline]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[inline]
    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    /// Cursor for the next page request
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    /// Whether the message at `index` is the first the channel ever had.
    /// Only knowable once pagination has reached the beginning.
    pub fn is_channel_start(&self, index: usize) -> bool {
        index == 0 && !self.has_more && !self.messages.is_empty()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Store the first page (newest-first as fetched). Returns how many
    /// messages were new.
    pub fn apply_initial_page(&mut self, page: Vec<Message>) -> usize {
        self.has_more = page.len() == self.fetch_limit;
        self.fetch_error = None;
        self.absorb_page(page)
    }

    /// Record a failed initial fetch; pagination stays halted until re-open
    pub fn fail_initial(&mut self, error: impl Into<String>) {
        self.has_more = false;
        self.fetch_error = Some(error.into());
    }

    /// Claim the single in-flight slot and return the cursor to fetch before.
    ///
    /// `None` means nothing to do: another load is running, the beginning was
    /// reached, or pagination is halted.
    pub fn begin_load_more(&mut self) -> Option<DateTime<Utc>> {
        if self.loading_more || !self.has_more {
            return None;
        }
        let cursor = self.cursor?;
        self.loading_more = true;
        Some(cursor)
    }

    /// Prepend an older page (newest-first as fetched)
    pub fn finish_load_more(&mut self, page: Vec<Message>) -> usize {
        self.loading_more = false;
        self.has_more = page.len() == self.fetch_limit;
        self.absorb_page(page)
    }

    /// Release the in-flight slot after a failed fetch and halt pagination
    pub fn abort_load_more(&mut self, error: impl Into<String>) {
        self.loading_more = false;
        self.has_more = false;
        self.fetch_error = Some(error.into());
    }

    /// Add a pushed message. Returns `false` for a duplicate id.
    pub fn append_live(&mut self, message: Message) -> bool {
        self.insert(message)
    }

    fn absorb_page(&mut self, page: Vec<Message>) -> usize {
        if let Some(oldest) = page.iter().map(|m| m.sent_at).min() {
            self.cursor = Some(self.cursor.map_or(oldest, |c| c.min(oldest)));
        }
        page.into_iter()
            .rev()
            .fold(0, |added, message| added + usize::from(self.insert(message)))
    }

    fn insert(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.message_id) {
            return false;
        }
        let key = message.ordering_key();
        match self.messages.last() {
            Some(tail) if tail.ordering_key() > key => {
                let at = self.messages.partition_point(|m| m.ordering_key() < key);
                self.messages.insert(at, message);
            }
            _ => self.messages.push(message),
        }
        true
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// Whether a timestamp separator goes above the message at `index`.
    ///
    /// True for the first message and whenever the gap to the previous one is
    /// strictly longer than the configured interval.
    pub fn should_show_timestamp_separator(&self, index: usize) -> bool {
        if index == 0 {
            return true;
        }
        match (self.messages.get(index - 1), self.messages.get(index)) {
            (Some(prev), Some(current)) => current.sent_at - prev.sent_at > self.separator_gap,
            _ => false,
        }
    }
}
