//! Context strategy trait and the window it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cache_markers::CacheMarker;
use super::rolling_state::RollingState;
use crate::models::Message;

/// One turn's planning input.
///
/// `history` is the ordered conversation as the store currently has it;
/// `new_message`, when present, is appended after it.
#[derive(Debug, Clone)]
pub struct ContextRequest<'a> {
    pub history: &'a [Message],
    pub new_message: Option<Message>,
    pub previous_marker: Option<CacheMarker>,
    /// Clock reading used to stamp rotations; defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

impl<'a> ContextRequest<'a> {
    pub fn new(history: &'a [Message]) -> Self {
        Self {
            history,
            new_message: None,
            previous_marker: None,
            now: None,
        }
    }

    pub fn with_new_message(mut self, message: Message) -> Self {
        self.new_message = Some(message);
        self
    }

    /// Pass the marker returned by the previous turn, if any
    pub fn with_previous_marker(mut self, marker: Option<CacheMarker>) -> Self {
        self.previous_marker = marker;
        self
    }

    /// Pin the clock, for reproducible rotation timestamps
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// History followed by the new message
    pub fn conversation(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend_from_slice(self.history);
        if let Some(message) = &self.new_message {
            messages.push(message.clone());
        }
        messages
    }
}

/// Why the caller's previous marker was not carried forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerInvalidation {
    /// A previously seen message switched branches
    BranchReset,
    /// This turn rotated messages out of the window
    MessagesDropped,
    /// The marker's message is no longer in the kept window
    MessageEvicted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMetadata {
    /// Messages in the conversation this turn, new message included
    pub total_messages: usize,
    /// Estimated tokens of the whole conversation
    pub total_tokens: usize,
    /// Estimated tokens of the kept messages
    pub kept_tokens: usize,
    /// Conversation index of the first kept message
    pub window_start: usize,
    /// Conversation index one past the last kept message
    pub window_end: usize,
    /// Messages rotated out by this turn
    pub dropped_count: usize,
    pub in_grace_period: bool,
    /// Planning state was discarded because a branch changed
    pub branch_reset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_invalidation: Option<MarkerInvalidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotation: Option<DateTime<Utc>>,
}

/// The messages to send this turn and where to place cache boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    /// Kept messages, in conversation order
    pub messages: Vec<Message>,
    /// Messages up to and including the last marker
    pub cacheable_prefix: Vec<Message>,
    /// Messages after the last marker
    pub active_window: Vec<Message>,
    /// Breakpoints in increasing order; empty means skip caching this turn
    pub cache_markers: Vec<CacheMarker>,
    /// Single breakpoint for clients that support only one
    pub cache_marker: Option<CacheMarker>,
    pub metadata: WindowMetadata,
}

impl ContextWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a window, splitting `messages` after the legacy marker.
    pub(crate) fn assemble(
        messages: Vec<Message>,
        cache_markers: Vec<CacheMarker>,
        cache_marker: Option<CacheMarker>,
        metadata: WindowMetadata,
    ) -> Self {
        let split = cache_marker
            .as_ref()
            .map_or(0, |marker| (marker.message_index + 1).min(messages.len()));
        let cacheable_prefix = messages[..split].to_vec();
        let active_window = messages[split..].to_vec();

        Self {
            messages,
            cacheable_prefix,
            active_window,
            cache_markers,
            cache_marker,
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Index of the first message after the cacheable prefix
    pub fn split_index(&self) -> usize {
        self.cacheable_prefix.len()
    }
}

/// A policy deciding which messages to send and where to place cache markers.
///
/// Planning is a pure transition: the caller owns the [`RollingState`] for each
/// conversation/participant pair, hands it in, and stores the state that comes
/// back. Strategies that keep no state return it unchanged. A state must only
/// ever be advanced by one conversation, one call at a time.
///
/// # Example
///
/// ```rust
/// use cachewindow_core::model_context::{
///     ContextRequest, ContextStrategy, RollingState, RollingStrategy, RollingStrategyConfig,
/// };
/// use cachewindow_core::models::Message;
///
/// let strategy = RollingStrategy::new(RollingStrategyConfig {
///     max_tokens: 1000,
///     max_grace_tokens: 200,
/// })
/// .unwrap();
///
/// let history = vec![Message::user("Hello!"), Message::assistant("Hi there.")];
/// let (window, state) = strategy.prepare_context(
///     RollingState::default(),
///     ContextRequest::new(&history).with_new_message(Message::user("How are you?")),
/// );
///
/// assert_eq!(window.messages.len(), 3);
/// assert!(window.cache_markers.is_empty());
/// assert_eq!(state.last_message_count, 3);
/// ```
pub trait ContextStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Plan this turn's window and advance the planning state.
    fn prepare_context(
        &self,
        state: RollingState,
        request: ContextRequest<'_>,
    ) -> (ContextWindow, RollingState);

    /// Whether `prepare_context` on this history would drop messages.
    fn should_rotate(&self, state: &RollingState, history: &[Message]) -> bool;

    /// A single breakpoint index for callers that do not need the full plan.
    fn cache_breakpoint(&self, messages: &[Message]) -> Option<usize>;
}
