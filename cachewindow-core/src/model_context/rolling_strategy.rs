//! Bounded rolling window with a grace period.
//!
//! The window may grow past `max_tokens` until it reaches
//! `max_tokens + max_grace_tokens`; only then are the oldest messages rotated
//! out, down to (never below) `max_tokens`. Rotating in large steps instead of
//! on every turn keeps the window's prefix, and with it the provider cache,
//! stable for many turns.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::cache_markers::{legacy_marker, CacheMarker, CacheMarkerPlanner};
use super::context_strategy::{
    ContextRequest, ContextStrategy, ContextWindow, MarkerInvalidation, WindowMetadata,
};
use super::rolling_state::{BranchSignature, RollingState};
use super::token_estimator::{CharacterEstimator, TokenEstimator};
use crate::constants::{EVENT_LOGGER_NAME, MAX_CACHE_POINTS, TRACE_LOGGER_NAME};
use crate::error::ConfigError;
use crate::logging::{BranchResetEvent, GracePeriodEnteredEvent, MarkerInvalidatedEvent, RotationEvent};
use crate::models::Message;

pub const DEFAULT_MAX_TOKENS: usize = 100_000;
pub const DEFAULT_MAX_GRACE_TOKENS: usize = 20_000;

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_max_grace_tokens() -> usize {
    DEFAULT_MAX_GRACE_TOKENS
}

/// Configuration for RollingStrategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingStrategyConfig {
    /// Soft budget, and the floor a rotation truncates to
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Extra growth allowed above `max_tokens` before rotating
    #[serde(default = "default_max_grace_tokens")]
    pub max_grace_tokens: usize,
}

impl Default for RollingStrategyConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_grace_tokens: DEFAULT_MAX_GRACE_TOKENS,
        }
    }
}

impl RollingStrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroValue { key: "max_tokens" });
        }
        if self.max_tokens.checked_add(self.max_grace_tokens).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "max_grace_tokens",
                value: self.max_grace_tokens.to_string(),
                expected: "a value whose sum with max_tokens fits in usize".to_string(),
            });
        }
        Ok(())
    }

    /// Hard ceiling; exceeding it forces a rotation
    pub fn max_total(&self) -> usize {
        self.max_tokens.saturating_add(self.max_grace_tokens)
    }
}

/// Rolling window strategy.
///
/// See [`ContextStrategy`] for the state-passing contract.
#[derive(Debug, Clone)]
pub struct RollingStrategy<E = CharacterEstimator> {
    config: RollingStrategyConfig,
    estimator: E,
    planner: CacheMarkerPlanner,
}

/// Scope of one turn after the branch check.
struct Evaluation {
    branch_reset: bool,
    /// Estimated cost of every conversation message
    costs: Vec<usize>,
    /// Conversation indices considered this turn, ascending
    scope: Vec<usize>,
    scope_tokens: usize,
}

impl RollingStrategy<CharacterEstimator> {
    pub fn new(config: RollingStrategyConfig) -> Result<Self, ConfigError> {
        Self::with_estimator(config, CharacterEstimator::new())
    }
}

impl<E: TokenEstimator> RollingStrategy<E> {
    pub fn with_estimator(config: RollingStrategyConfig, estimator: E) -> Result<Self, ConfigError> {
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

    pub fn config(&self) -> &RollingStrategyConfig {
        &self.config
    }

    /// Spacing between cache targets
    pub fn step_size(&self) -> usize {
        (self.config.max_total() / 5).max(self.planner.min_tokens())
    }

    /// Branch check and evaluation scope; resets `state` on a branch change.
    fn evaluate(&self, state: &mut RollingState, conversation: &[Message], history_len: usize) -> Evaluation {
        let compared = state.last_message_count.min(history_len);
        let signature = BranchSignature::of(&conversation[..compared]);
        let branch_reset = signature != state.last_branch_signature;

        if branch_reset {
            info!(
                target: EVENT_LOGGER_NAME,
                "{}",
                BranchResetEvent::new(state.last_message_count, conversation.len())
            );
            state.reset();
        }

        let prior_count = state.last_message_count;
        let costs: Vec<usize> = conversation
            .iter()
            .map(|message| self.estimator.estimate(message))
            .collect();

        let scope: Vec<usize> = if state.window_message_ids.is_empty() {
            (0..conversation.len()).collect()
        } else {
            (0..conversation.len())
                .filter(|&i| i >= prior_count || state.window_message_ids.contains(&conversation[i].id))
                .collect()
        };
        let scope_tokens = scope.iter().map(|&i| costs[i]).sum();

        Evaluation {
            branch_reset,
            costs,
            scope,
            scope_tokens,
        }
    }

    /// Position in `scope` from which the kept tail first reaches `max_tokens`.
    fn rotation_start(&self, scope: &[usize], costs: &[usize]) -> usize {
        let mut cumulative = 0usize;
        for pos in (0..scope.len()).rev() {
            cumulative += costs[scope[pos]];
            if cumulative >= self.config.max_tokens {
                return pos;
            }
        }
        0
    }

    /// Carry a surviving marker onto the kept window, if it is still placeable.
    fn reanchor(&self, marker: &CacheMarker, kept: &[Message], kept_costs: &[usize]) -> Option<CacheMarker> {
        let index = kept.iter().position(|message| message.id == marker.message_id)?;
        if !kept[index].is_user() {
            return None;
        }
        let token_count: usize = kept_costs[..=index].iter().sum();
        if token_count < self.planner.min_tokens() {
            return None;
        }
        Some(CacheMarker {
            message_id: marker.message_id.clone(),
            message_index: index,
            token_count,
        })
    }
}

impl<E: TokenEstimator> ContextStrategy for RollingStrategy<E> {
    fn name(&self) -> &'static str {
        "rolling"
    }

    fn prepare_context(
        &self,
        mut state: RollingState,
        request: ContextRequest<'_>,
    ) -> (ContextWindow, RollingState) {
        let now = request.timestamp();
        let history_len = request.history.len();
        let conversation = request.conversation();
        let previous_marker = request.previous_marker;

        let Evaluation {
            branch_reset,
            costs,
            mut scope,
            scope_tokens,
        } = self.evaluate(&mut state, &conversation, history_len);

        let max_tokens = self.config.max_tokens;
        let mut dropped_count = 0usize;

        if scope_tokens > self.config.max_total() {
            let start = self.rotation_start(&scope, &costs);
            scope.drain(..start);
            dropped_count = start;

            let kept_tokens: usize = scope.iter().map(|&i| costs[i]).sum();
            state.in_grace_period = false;
            state.baseline_tokens = kept_tokens;
            if dropped_count > 0 {
                state.last_rotation = Some(now);
                info!(
                    target: EVENT_LOGGER_NAME,
                    "{}",
                    RotationEvent::new(
                        dropped_count,
                        scope.len(),
                        kept_tokens,
                        scope_tokens,
                        max_tokens,
                        self.config.max_grace_tokens,
                    )
                );
            }
        } else if !state.in_grace_period && scope_tokens > max_tokens {
            state.in_grace_period = true;
            state.baseline_tokens = scope_tokens;
            debug!(
                target: EVENT_LOGGER_NAME,
                "{}",
                GracePeriodEnteredEvent::new(scope_tokens, max_tokens, self.config.max_total())
            );
        }

        state.window_message_ids = scope.iter().map(|&i| conversation[i].id.clone()).collect();
        state.last_message_count = conversation.len();
        state.last_branch_signature = BranchSignature::of(&conversation);

        let total_messages = conversation.len();
        let total_tokens: usize = costs.iter().sum();
        let window_start = scope.first().copied().unwrap_or(total_messages);

        let mut in_scope = vec![false; total_messages];
        for &i in &scope {
            in_scope[i] = true;
        }
        let kept_costs: Vec<usize> = scope.iter().map(|&i| costs[i]).collect();
        let kept: Vec<Message> = conversation
            .into_iter()
            .zip(in_scope)
            .filter_map(|(message, keep)| keep.then_some(message))
            .collect();
        let kept_tokens: usize = kept_costs.iter().sum();

        let marker_invalidation = previous_marker.as_ref().and_then(|marker| {
            if branch_reset {
                Some(MarkerInvalidation::BranchReset)
            } else if dropped_count > 0 {
                Some(MarkerInvalidation::MessagesDropped)
            } else if !kept.iter().any(|message| message.id == marker.message_id) {
                Some(MarkerInvalidation::MessageEvicted)
            } else {
                None
            }
        });
        let surviving_marker = match (previous_marker, marker_invalidation) {
            (Some(marker), Some(reason)) => {
                debug!(
                    target: EVENT_LOGGER_NAME,
                    "{}",
                    MarkerInvalidatedEvent::new(marker.message_id, reason)
                );
                None
            }
            (marker, _) => marker,
        };

        let mut cache_markers = if kept_tokens >= self.planner.min_tokens() {
            self.planner.plan_with_costs(
                &kept,
                &kept_costs,
                kept_tokens,
                self.step_size(),
                MAX_CACHE_POINTS,
            )
        } else {
            Vec::new()
        };
        if cache_markers.is_empty() {
            cache_markers.extend(
                surviving_marker
                    .as_ref()
                    .and_then(|marker| self.reanchor(marker, &kept, &kept_costs)),
            );
        }
        let cache_marker = legacy_marker(&cache_markers);

        trace!(
            target: TRACE_LOGGER_NAME,
            total_messages,
            kept = kept.len(),
            kept_tokens,
            dropped_count,
            markers = cache_markers.len(),
            phase = ?state.phase(),
            "rolling window planned"
        );

        let metadata = WindowMetadata {
            total_messages,
            total_tokens,
            kept_tokens,
            window_start,
            window_end: total_messages,
            dropped_count,
            in_grace_period: state.in_grace_period,
            branch_reset,
            marker_invalidation,
            last_rotation: state.last_rotation,
        };

        (
            ContextWindow::assemble(kept, cache_markers, cache_marker, metadata),
            state,
        )
    }

    fn should_rotate(&self, state: &RollingState, history: &[Message]) -> bool {
        let mut probe = state.clone();
        let evaluation = self.evaluate(&mut probe, history, history.len());
        evaluation.scope_tokens > self.config.max_total()
    }

    fn cache_breakpoint(&self, messages: &[Message]) -> Option<usize> {
        let target = self.config.max_total() / 2;
        let mut cumulative = 0usize;
        for (index, message) in messages.iter().enumerate() {
            cumulative += self.estimator.estimate(message);
            if cumulative >= target {
                return Some(index);
            }
        }
        None
    }
}
