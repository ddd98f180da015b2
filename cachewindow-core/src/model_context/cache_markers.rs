//! Cache breakpoint planning.
//!
//! A cache marker splits the window into a prefix the provider may serve from
//! its prompt cache and a fresh suffix. Providers only accept breakpoints on
//! user messages and only cache prefixes above a minimum size, so candidate
//! positions are walked back to the nearest user message and undersized
//! prefixes are dropped rather than stretched.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::token_estimator::TokenEstimator;
use crate::constants::{PROVIDER_MIN_CACHEABLE_TOKENS, TRACE_LOGGER_NAME, USER_ROLE_LOOKBACK};
use crate::models::{Message, MessageId};

/// Boundary between a cacheable prefix and the fresh suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMarker {
    /// Message the boundary is placed on
    pub message_id: MessageId,
    /// Position of that message in the window
    pub message_index: usize,
    /// Estimated tokens of the window up to and including that message
    pub token_count: usize,
}

/// Computes cache breakpoints at evenly spaced token targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMarkerPlanner {
    min_tokens: usize,
    lookback: usize,
}

impl Default for CacheMarkerPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMarkerPlanner {
    pub fn new() -> Self {
        Self {
            min_tokens: PROVIDER_MIN_CACHEABLE_TOKENS,
            lookback: USER_ROLE_LOOKBACK,
        }
    }

    /// Override how far back a candidate may move to reach a user message
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Override the provider's minimum cacheable prefix
    pub fn with_min_tokens(mut self, min_tokens: usize) -> Self {
        self.min_tokens = min_tokens;
        self
    }

    pub fn min_tokens(&self) -> usize {
        self.min_tokens
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Plan up to `max_points` markers targeted at multiples of `step_size`.
    ///
    /// Targets above `total_tokens` are skipped. The result is ordered by
    /// position and may be empty, which means no caching this turn.
    pub fn plan<E: TokenEstimator + ?Sized>(
        &self,
        estimator: &E,
        messages: &[Message],
        total_tokens: usize,
        step_size: usize,
        max_points: usize,
    ) -> Vec<CacheMarker> {
        let costs: Vec<usize> = messages.iter().map(|m| estimator.estimate(m)).collect();
        self.plan_with_costs(messages, &costs, total_tokens, step_size, max_points)
    }

    /// Same as [`plan`](Self::plan) with per-message costs already estimated.
    ///
    /// `costs` must be parallel to `messages`.
    pub fn plan_with_costs(
        &self,
        messages: &[Message],
        costs: &[usize],
        total_tokens: usize,
        step_size: usize,
        max_points: usize,
    ) -> Vec<CacheMarker> {
        let mut markers: Vec<CacheMarker> = Vec::new();
        if messages.is_empty() || costs.len() != messages.len() || step_size == 0 || max_points == 0 {
            return markers;
        }

        let mut cumulative = 0usize;
        let mut next = 0usize;

        for point in 1..=max_points {
            let target = point.saturating_mul(step_size);
            if target > total_tokens {
                trace!(target: TRACE_LOGGER_NAME, target, total_tokens, "cache target beyond conversation");
                continue;
            }

            while next < messages.len() && cumulative < target {
                cumulative += costs[next];
                next += 1;
            }
            if cumulative < target {
                break;
            }

            let mut index = next - 1;
            let mut tokens = cumulative;

            if !messages[index].is_user() {
                match self.find_user_before(messages, costs, index) {
                    Some((user_index, removed)) => {
                        index = user_index;
                        tokens -= removed;
                        next = user_index + 1;
                        cumulative = tokens;
                    }
                    None => {
                        trace!(target: TRACE_LOGGER_NAME, target, index, "no user message within lookback");
                        continue;
                    }
                }
            }

            if markers.iter().any(|marker| marker.message_index == index) {
                trace!(target: TRACE_LOGGER_NAME, target, index, "cache target collapsed onto existing marker");
                continue;
            }
            // a zero-cost user message can pull a later target back onto the same prefix size
            if markers.last().is_some_and(|last| tokens <= last.token_count) {
                trace!(target: TRACE_LOGGER_NAME, target, tokens, "cache target adds no tokens over previous marker");
                continue;
            }
            if tokens < self.min_tokens {
                trace!(target: TRACE_LOGGER_NAME, target, tokens, "cache prefix below provider minimum");
                continue;
            }

            markers.push(CacheMarker {
                message_id: messages[index].id.clone(),
                message_index: index,
                token_count: tokens,
            });
        }

        markers
    }

    /// Nearest user message strictly before `index`, within the lookback, and
    /// the tokens of the messages between it and `index` (inclusive).
    fn find_user_before(
        &self,
        messages: &[Message],
        costs: &[usize],
        index: usize,
    ) -> Option<(usize, usize)> {
        let mut removed = 0usize;
        for back in 1..=self.lookback {
            let candidate = index.checked_sub(back)?;
            removed += costs[candidate + 1];
            if messages[candidate].is_user() {
                return Some((candidate, removed));
            }
        }
        None
    }
}

/// The single marker reported to callers that only handle one breakpoint.
pub fn legacy_marker(markers: &[CacheMarker]) -> Option<CacheMarker> {
    markers.last().cloned()
}
