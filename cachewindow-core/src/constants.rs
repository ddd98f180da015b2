//! Constants used in the cachewindow-core crate.

/// Logger name used for root logger
pub const ROOT_LOGGER_NAME: &str = "cachewindow_core";

/// Logger name used for structured event logging
pub const EVENT_LOGGER_NAME: &str = "cachewindow_core.events";

/// Logger name used for developer intended trace logging. The content and format of this log should not be depended upon.
pub const TRACE_LOGGER_NAME: &str = "cachewindow_core.trace";

/// Smallest prefix, in tokens, a provider will cache.
pub const PROVIDER_MIN_CACHEABLE_TOKENS: usize = 1024;

/// Maximum number of cache breakpoints requested per window.
pub const MAX_CACHE_POINTS: usize = 4;

/// How many messages the marker planner walks backward to find a user message.
pub const USER_ROLE_LOOKBACK: usize = 5;
