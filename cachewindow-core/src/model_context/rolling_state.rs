//! Per-conversation planning state carried between turns.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BranchId, Message, MessageId};

/// Which branch was active for each message, in order.
///
/// Appending messages extends the signature; switching the branch of an
/// earlier message changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchSignature(Vec<BranchId>);

impl BranchSignature {
    pub fn of(messages: &[Message]) -> Self {
        Self(
            messages
                .iter()
                .map(|message| message.active_branch_id.clone())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BranchSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(id.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningPhase {
    Normal,
    /// Over the soft budget; growth allowed up to the hard ceiling
    GracePeriod,
}

/// Planning state of one conversation/participant pair.
///
/// Lives in memory only. Losing it (a restart, a new session) is harmless:
/// the next turn starts from the default and recomputes the full window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingState {
    pub in_grace_period: bool,
    /// Window tokens when the grace period began or the last rotation ended
    pub baseline_tokens: usize,
    /// Conversation length seen by the previous turn
    pub last_message_count: usize,
    pub last_branch_signature: BranchSignature,
    /// Messages currently considered in window; empty means "everything"
    pub window_message_ids: BTreeSet<MessageId>,
    pub last_rotation: Option<DateTime<Utc>>,
}

impl RollingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PlanningPhase {
        if self.in_grace_period {
            PlanningPhase::GracePeriod
        } else {
            PlanningPhase::Normal
        }
    }

    /// Forget everything, as on a conversation switch
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if no turn has been planned since creation or the last reset
    pub fn is_fresh(&self) -> bool {
        self.last_message_count == 0 && self.window_message_ids.is_empty()
    }
}
