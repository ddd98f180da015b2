//! Test utilities and helpers for cachewindow-core tests
#![allow(dead_code)]

use cachewindow_core::constants::PROVIDER_MIN_CACHEABLE_TOKENS;
use cachewindow_core::model_context::{CacheMarker, ContextWindow};
use cachewindow_core::models::{Message, Role};

/// A message whose active branch estimates to exactly `tokens`
pub fn message(role: Role, tokens: usize) -> Message {
    Message::with_role(role, "x".repeat(tokens * 4))
}

pub fn user(tokens: usize) -> Message {
    message(Role::User, tokens)
}

pub fn assistant(tokens: usize) -> Message {
    message(Role::Assistant, tokens)
}

pub fn tool(tokens: usize) -> Message {
    message(Role::Tool, tokens)
}

/// `count` messages of `tokens` each, alternating user and assistant
pub fn alternating(count: usize, tokens: usize) -> Vec<Message> {
    (0..count)
        .map(|i| if i % 2 == 0 { user(tokens) } else { assistant(tokens) })
        .collect()
}

/// Check the provider placement rules on every marker of a window
pub fn assert_markers_valid(window: &ContextWindow) {
    assert_marker_list_valid(&window.messages, &window.cache_markers);
    if let Some(marker) = &window.cache_marker {
        assert_marker_list_valid(&window.messages, std::slice::from_ref(marker));
        assert_eq!(window.split_index(), marker.message_index + 1);
    } else {
        assert_eq!(window.split_index(), 0);
    }
}

pub fn assert_marker_list_valid(messages: &[Message], markers: &[CacheMarker]) {
    for pair in markers.windows(2) {
        assert!(
            pair[0].message_index < pair[1].message_index,
            "marker indices must strictly increase: {:?}",
            markers
        );
        assert!(
            pair[0].token_count < pair[1].token_count,
            "marker token counts must strictly increase: {:?}",
            markers
        );
    }
    for marker in markers {
        let target = &messages[marker.message_index];
        assert_eq!(target.id, marker.message_id);
        assert!(target.is_user(), "marker on non-user message: {:?}", marker);
        assert!(
            marker.token_count >= PROVIDER_MIN_CACHEABLE_TOKENS,
            "marker below provider minimum: {:?}",
            marker
        );
    }
}

/// Route test logs through the test harness; `RUST_LOG` controls the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_helpers_produce_exact_costs() {
    use cachewindow_core::model_context::{CharacterEstimator, TokenEstimator};

    let estimator = CharacterEstimator::new();
    assert_eq!(estimator.estimate(&user(250)), 250);
    assert_eq!(estimator.total_tokens(&alternating(4, 100)), 400);
    assert_eq!(tool(3).role(), Some(Role::Tool));
}
