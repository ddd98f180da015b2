//! Message-count windowing.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::cache_markers::{legacy_marker, CacheMarkerPlanner};
use super::context_strategy::{ContextRequest, ContextStrategy, ContextWindow, WindowMetadata};
use super::rolling_state::RollingState;
use super::token_estimator::{CharacterEstimator, TokenEstimator};
use crate::constants::{MAX_CACHE_POINTS, TRACE_LOGGER_NAME};
use crate::error::ConfigError;
use crate::models::{Message, Role};

pub const DEFAULT_BUFFER_SIZE: usize = 50;

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Configuration for MessageCountStrategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCountStrategyConfig {
    /// Messages kept, counted from the newest
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for MessageCountStrategyConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl MessageCountStrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroValue { key: "buffer_size" });
        }
        Ok(())
    }
}

/// A strategy that sends only the newest `buffer_size` messages.
///
/// Token budgets are ignored; this is the older policy kept for callers that
/// window by message count.
#[derive(Debug, Clone)]
pub struct MessageCountStrategy<E = CharacterEstimator> {
    config: MessageCountStrategyConfig,
    estimator: E,
    planner: CacheMarkerPlanner,
}

impl MessageCountStrategy<CharacterEstimator> {
    pub fn new(config: MessageCountStrategyConfig) -> Result<Self, ConfigError> {
        Self::with_estimator(config, CharacterEstimator::new())
    }
}

impl<E: TokenEstimator> MessageCountStrategy<E> {
    pub fn with_estimator(config: MessageCountStrategyConfig, estimator: E) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            estimator,
            planner: CacheMarkerPlanner::new(),
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    /// Index of the first buffered message
    fn window_start(&self, messages: &[Message]) -> usize {
        let mut start = messages.len().saturating_sub(self.config.buffer_size);
        // a tool result without the call that produced it is useless
        if start > 0 && messages.get(start).and_then(Message::role) == Some(Role::Tool) {
            start += 1;
        }
        start
    }
}

impl<E: TokenEstimator> ContextStrategy for MessageCountStrategy<E> {
    fn name(&self) -> &'static str {
        "message_count"
    }

    fn prepare_context(
        &self,
        state: RollingState,
        request: ContextRequest<'_>,
    ) -> (ContextWindow, RollingState) {
        let conversation = request.conversation();
        let costs: Vec<usize> = conversation.iter().map(|m| self.estimator.estimate(m)).collect();
        let total_tokens: usize = costs.iter().sum();
        let total_messages = conversation.len();

        let start = self.window_start(&conversation);
        let kept: Vec<Message> = conversation.into_iter().skip(start).collect();
        let kept_costs = &costs[start..];
        let kept_tokens: usize = kept_costs.iter().sum();

        let cache_markers = if kept_tokens >= self.planner.min_tokens() {
            let step = (kept_tokens / MAX_CACHE_POINTS).max(self.planner.min_tokens());
            self.planner
                .plan_with_costs(&kept, kept_costs, kept_tokens, step, MAX_CACHE_POINTS)
        } else {
            Vec::new()
        };
        let cache_marker = legacy_marker(&cache_markers);

        trace!(
            target: TRACE_LOGGER_NAME,
            total_messages,
            kept = kept.len(),
            dropped = start,
            "message-count window planned"
        );

        let metadata = WindowMetadata {
            total_messages,
            total_tokens,
            kept_tokens,
            window_start: start,
            window_end: total_messages,
            dropped_count: start,
            ..WindowMetadata::default()
        };

        (
            ContextWindow::assemble(kept, cache_markers, cache_marker, metadata),
            state,
        )
    }

    fn should_rotate(&self, _state: &RollingState, history: &[Message]) -> bool {
        history.len() > self.config.buffer_size
    }

    fn cache_breakpoint(&self, messages: &[Message]) -> Option<usize> {
        let start = self.window_start(messages);
        let kept = &messages[start..];
        let costs: Vec<usize> = kept.iter().map(|m| self.estimator.estimate(m)).collect();
        let kept_tokens: usize = costs.iter().sum();
        let step = (kept_tokens / MAX_CACHE_POINTS).max(self.planner.min_tokens());
        legacy_marker(&self.planner.plan_with_costs(kept, &costs, kept_tokens, step, MAX_CACHE_POINTS))
            .map(|marker| start + marker.message_index)
    }
}
