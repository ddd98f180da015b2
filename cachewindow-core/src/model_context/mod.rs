//! Context window planning.
//!
//! This module provides the token estimator, the cache marker planner and the
//! strategies that decide which part of a conversation is sent to the model
//! each turn and where the provider's prompt-cache breakpoints go.

mod append_strategy;
mod cache_markers;
mod context_strategy;
mod message_count_strategy;
mod rolling_state;
mod rolling_strategy;
mod strategy_config;
mod token_estimator;

pub use append_strategy::{
    AppendStrategy, AppendStrategyConfig, DEFAULT_TOKENS_BEFORE_CACHING, UNCACHED_TAIL_TOKENS,
};
pub use cache_markers::{legacy_marker, CacheMarker, CacheMarkerPlanner};
pub use context_strategy::{
    ContextRequest, ContextStrategy, ContextWindow, MarkerInvalidation, WindowMetadata,
};
pub use message_count_strategy::{
    MessageCountStrategy, MessageCountStrategyConfig, DEFAULT_BUFFER_SIZE,
};
pub use rolling_state::{BranchSignature, PlanningPhase, RollingState};
pub use rolling_strategy::{
    RollingStrategy, RollingStrategyConfig, DEFAULT_MAX_GRACE_TOKENS, DEFAULT_MAX_TOKENS,
};
pub use strategy_config::StrategyConfig;
pub use token_estimator::{
    CharacterEstimator, TokenEstimator, CHARS_PER_TOKEN, IMAGE_ATTACHMENT_TOKENS,
    REASONING_TAG_OVERHEAD, REDACTED_REASONING_TOKENS,
};
