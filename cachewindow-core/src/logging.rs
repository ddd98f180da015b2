//! Structured planning events.
//!
//! Each event serializes to a JSON object with a `type` field and renders as
//! that JSON through `Display`, so it can be logged on [`EVENT_LOGGER_NAME`]
//! and parsed back by log processors.
//!
//! [`EVENT_LOGGER_NAME`]: crate::constants::EVENT_LOGGER_NAME

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use serde_json::Value;

use crate::model_context::MarkerInvalidation;
use crate::models::MessageId;

macro_rules! display_as_json {
    ($event:ident) => {
        impl std::fmt::Display for $event {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match serde_json::to_string(self) {
                    Ok(json) => write!(f, "{}", json),
                    Err(_) => write!(f, concat!(stringify!($event), " serialization error")),
                }
            }
        }
    };
}

/// Event for logging a rolling-window rotation
#[derive(Debug, Serialize, Deserialize)]
pub struct RotationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub dropped_count: usize,
    pub kept_count: usize,
    pub kept_tokens: usize,
    pub evaluated_tokens: usize,
    pub max_tokens: usize,
    pub max_grace_tokens: usize,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl RotationEvent {
    pub fn new(
        dropped_count: usize,
        kept_count: usize,
        kept_tokens: usize,
        evaluated_tokens: usize,
        max_tokens: usize,
        max_grace_tokens: usize,
    ) -> Self {
        Self {
            event_type: "Rotation".to_string(),
            dropped_count,
            kept_count,
            kept_tokens,
            evaluated_tokens,
            max_tokens,
            max_grace_tokens,
            extra: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: String, value: Value) -> Self {
        self.extra.insert(key, value);
        self
    }
}

display_as_json!(RotationEvent);

/// Event for logging the start of a grace period
#[derive(Debug, Serialize, Deserialize)]
pub struct GracePeriodEnteredEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub baseline_tokens: usize,
    pub max_tokens: usize,
    pub max_total_tokens: usize,
}

impl GracePeriodEnteredEvent {
    pub fn new(baseline_tokens: usize, max_tokens: usize, max_total_tokens: usize) -> Self {
        Self {
            event_type: "GracePeriodEntered".to_string(),
            baseline_tokens,
            max_tokens,
            max_total_tokens,
        }
    }
}

display_as_json!(GracePeriodEnteredEvent);

/// Event for logging a planning-state reset caused by a branch switch
#[derive(Debug, Serialize, Deserialize)]
pub struct BranchResetEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub previous_message_count: usize,
    pub message_count: usize,
}

impl BranchResetEvent {
    pub fn new(previous_message_count: usize, message_count: usize) -> Self {
        Self {
            event_type: "BranchReset".to_string(),
            previous_message_count,
            message_count,
        }
    }
}

display_as_json!(BranchResetEvent);

/// Event for logging a discarded cache marker
#[derive(Debug, Serialize, Deserialize)]
pub struct MarkerInvalidatedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message_id: MessageId,
    pub reason: MarkerInvalidation,
}

impl MarkerInvalidatedEvent {
    pub fn new(message_id: MessageId, reason: MarkerInvalidation) -> Self {
        Self {
            event_type: "MarkerInvalidated".to_string(),
            message_id,
            reason,
        }
    }
}

display_as_json!(MarkerInvalidatedEvent);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_event_renders_as_json() {
        let event = RotationEvent::new(3, 5, 1010, 1300, 1000, 200)
            .with_extra("conversation".to_string(), Value::from("c1"));
        let parsed: Value = serde_json::from_str(&event.to_string()).unwrap();
        assert_eq!(parsed["type"], "Rotation");
        assert_eq!(parsed["dropped_count"], 3);
        assert_eq!(parsed["conversation"], "c1");
    }

    #[test]
    fn test_marker_event_reason() {
        let event = MarkerInvalidatedEvent::new(MessageId::from("m9"), MarkerInvalidation::MessageEvicted);
        let parsed: Value = serde_json::from_str(&event.to_string()).unwrap();
        assert_eq!(parsed["type"], "MarkerInvalidated");
        assert_eq!(parsed["message_id"], "m9");
        assert_eq!(parsed["reason"], "message_evicted");
    }

    #[test]
    fn test_branch_and_grace_events() {
        let reset: Value = serde_json::from_str(&BranchResetEvent::new(4, 5).to_string()).unwrap();
        assert_eq!(reset["type"], "BranchReset");
        let grace: Value =
            serde_json::from_str(&GracePeriodEnteredEvent::new(1050, 1000, 1200).to_string()).unwrap();
        assert_eq!(grace["baseline_tokens"], 1050);
    }
}
