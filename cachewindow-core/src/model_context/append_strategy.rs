//! Append-only context strategy.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::cache_markers::{legacy_marker, CacheMarkerPlanner};
use super::context_strategy::{ContextRequest, ContextStrategy, ContextWindow, WindowMetadata};
use super::rolling_state::RollingState;
use super::token_estimator::{CharacterEstimator, TokenEstimator};
use crate::constants::{MAX_CACHE_POINTS, TRACE_LOGGER_NAME};
use crate::error::ConfigError;
use crate::models::Message;

pub const DEFAULT_TOKENS_BEFORE_CACHING: usize = 10_000;

/// Tokens left uncached after the single breakpoint
pub const UNCACHED_TAIL_TOKENS: usize = 1000;

fn default_tokens_before_caching() -> usize {
    DEFAULT_TOKENS_BEFORE_CACHING
}

/// Configuration for AppendStrategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendStrategyConfig {
    /// Conversation size at which caching starts, and the granularity at which
    /// the cached span grows
    #[serde(default = "default_tokens_before_caching")]
    pub tokens_before_caching: usize,
}

impl Default for AppendStrategyConfig {
    fn default() -> Self {
        Self {
            tokens_before_caching: DEFAULT_TOKENS_BEFORE_CACHING,
        }
    }
}

impl AppendStrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens_before_caching == 0 {
            return Err(ConfigError::ZeroValue {
                key: "tokens_before_caching",
            });
        }
        Ok(())
    }
}

/// A strategy that sends the whole conversation every turn.
///
/// Nothing is ever dropped. Cache markers are spread over the largest whole
/// multiple of `tokens_before_caching` the conversation has reached, so they
/// only move when the conversation crosses the next multiple.
///
/// # Example
///
/// ```rust
/// use cachewindow_core::model_context::{
///     AppendStrategy, AppendStrategyConfig, ContextRequest, ContextStrategy, RollingState,
/// };
/// use cachewindow_core::models::Message;
///
/// let strategy = AppendStrategy::new(AppendStrategyConfig { tokens_before_caching: 10_000 }).unwrap();
/// let history = vec![Message::user("Hello!")];
///
/// let (window, _) = strategy.prepare_context(RollingState::default(), ContextRequest::new(&history));
/// assert_eq!(window.messages.len(), 1);
/// assert!(!strategy.should_rotate(&RollingState::default(), &history));
/// ```
#[derive(Debug, Clone)]
pub struct AppendStrategy<E = CharacterEstimator> {
    config: AppendStrategyConfig,
    estimator: E,
    planner: CacheMarkerPlanner,
}

impl AppendStrategy<CharacterEstimator> {
    pub fn new(config: AppendStrategyConfig) -> Result<Self, ConfigError> {
        Self::with_estimator(config, CharacterEstimator::new())
    }
}

impl<E: TokenEstimator> AppendStrategy<E> {
    pub fn with_estimator(config: AppendStrategyConfig, estimator: E) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            estimator,
            planner: CacheMarkerPlanner::new(),
        })
    }

    pub fn with_planner(mut self, planner: CacheMarkerPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn config(&self) -> &AppendStrategyConfig {
        &self.config
    }

    /// Largest multiple of `tokens_before_caching` not above `total_tokens`
    pub fn current_window(&self, total_tokens: usize) -> usize {
        let step = self.config.tokens_before_caching;
        (total_tokens / step) * step
    }
}

impl<E: TokenEstimator> ContextStrategy for AppendStrategy<E> {
    fn name(&self) -> &'static str {
        "append"
    }

    fn prepare_context(
        &self,
        state: RollingState,
        request: ContextRequest<'_>,
    ) -> (ContextWindow, RollingState) {
        let messages = request.conversation();
        let costs: Vec<usize> = messages.iter().map(|m| self.estimator.estimate(m)).collect();
        let total_tokens: usize = costs.iter().sum();

        let cache_markers = if total_tokens < self.config.tokens_before_caching {
            Vec::new()
        } else {
            let current_window = self.current_window(total_tokens);
            self.planner.plan_with_costs(
                &messages,
                &costs,
                total_tokens,
                current_window / MAX_CACHE_POINTS,
                MAX_CACHE_POINTS,
            )
        };
        let cache_marker = legacy_marker(&cache_markers);

        trace!(
            target: TRACE_LOGGER_NAME,
            total_messages = messages.len(),
            total_tokens,
            markers = cache_markers.len(),
            "append window planned"
        );

        let metadata = WindowMetadata {
            total_messages: messages.len(),
            total_tokens,
            kept_tokens: total_tokens,
            window_start: 0,
            window_end: messages.len(),
            ..WindowMetadata::default()
        };

        (
            ContextWindow::assemble(messages, cache_markers, cache_marker, metadata),
            state,
        )
    }

    fn should_rotate(&self, _state: &RollingState, _history: &[Message]) -> bool {
        false
    }

    fn cache_breakpoint(&self, messages: &[Message]) -> Option<usize> {
        let mut tail = 0usize;
        for index in (0..messages.len()).rev() {
            let cost = self.estimator.estimate(&messages[index]);
            if tail + cost > UNCACHED_TAIL_TOKENS {
                return Some(index);
            }
            tail += cost;
        }
        None
    }
}
