//! Planning state management
//!
//! Strategies are pure: they take a [`RollingState`] and return the next one.
//! [`PlanningSessions`] is the caller-side store that keeps that state, along
//! with the last cache marker, for each conversation/participant pair.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::constants::ROOT_LOGGER_NAME;
use crate::error::{Result, SessionError};
use crate::model_context::{CacheMarker, ContextRequest, ContextStrategy, ContextWindow, RollingState, StrategyConfig};

/// Identifies one planning session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub conversation_id: String,
    pub participant_id: String,
}

impl SessionKey {
    pub fn new<C: Into<String>, P: Into<String>>(conversation_id: C, participant_id: P) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.participant_id)
    }
}

/// State kept between turns of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningSession {
    pub state: RollingState,
    /// Legacy marker returned by the last turn
    pub last_marker: Option<CacheMarker>,
    /// Turns planned since the session began
    pub turns: u64,
    pub started_at: DateTime<Utc>,
    pub last_prepared: Option<DateTime<Utc>>,
}

impl PlanningSession {
    fn new() -> Self {
        Self {
            state: RollingState::default(),
            last_marker: None,
            turns: 0,
            started_at: Utc::now(),
            last_prepared: None,
        }
    }
}

/// Per-conversation planning sessions over one strategy.
///
/// Calls for the same key must be serial; the store itself does no locking.
///
/// # Example
///
/// ```rust
/// use cachewindow_core::model_context::{ContextRequest, StrategyConfig};
/// use cachewindow_core::models::Message;
/// use cachewindow_core::state_manager::{PlanningSessions, SessionKey};
///
/// let mut sessions = PlanningSessions::from_config(&StrategyConfig::default()).unwrap();
/// let key = SessionKey::new("conversation-1", "assistant");
/// sessions.begin(key.clone());
///
/// let history = vec![Message::user("Hello!")];
/// let window = sessions.prepare(&key, ContextRequest::new(&history)).unwrap();
/// assert_eq!(window.messages.len(), 1);
/// ```
pub struct PlanningSessions {
    strategy: Box<dyn ContextStrategy>,
    sessions: HashMap<SessionKey, PlanningSession>,
}

impl PlanningSessions {
    pub fn new(strategy: Box<dyn ContextStrategy>) -> Self {
        Self {
            strategy,
            sessions: HashMap::new(),
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        Ok(Self::new(config.build()?))
    }

    pub fn strategy(&self) -> &dyn ContextStrategy {
        self.strategy.as_ref()
    }

    /// Start a session, discarding any existing one for the same key
    pub fn begin(&mut self, key: SessionKey) {
        debug!(target: ROOT_LOGGER_NAME, session = %key, "planning session started");
        self.sessions.insert(key, PlanningSession::new());
    }

    /// Plan the next turn of a session.
    ///
    /// When the request carries no previous marker, the one stored from the
    /// last turn is passed to the strategy.
    pub fn prepare(&mut self, key: &SessionKey, request: ContextRequest<'_>) -> Result<ContextWindow> {
        let span = info_span!(
            target: ROOT_LOGGER_NAME,
            "prepare_context",
            conversation = %key.conversation_id,
            participant = %key.participant_id,
            strategy = self.strategy.name(),
        );
        let _guard = span.enter();

        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotStarted {
                conversation_id: key.conversation_id.clone(),
                participant_id: key.participant_id.clone(),
            })?;

        let request = if request.previous_marker.is_none() {
            let stored = session.last_marker.clone();
            request.with_previous_marker(stored)
        } else {
            request
        };
        let now = request.timestamp();
        let request = request.at(now);

        let state = std::mem::take(&mut session.state);
        let (window, next) = self.strategy.prepare_context(state, request);

        session.state = next;
        session.last_marker = window.cache_marker.clone();
        session.turns += 1;
        session.last_prepared = Some(now);

        debug!(
            target: ROOT_LOGGER_NAME,
            turn = session.turns,
            kept = window.len(),
            markers = window.cache_markers.len(),
            "turn planned"
        );
        Ok(window)
    }

    /// Whether the next turn of a session would rotate
    pub fn should_rotate(&self, key: &SessionKey, history: &[crate::models::Message]) -> Result<bool> {
        let session = self.get(key)?;
        Ok(self.strategy.should_rotate(&session.state, history))
    }

    /// Forget a session's window without ending it
    pub fn reset(&mut self, key: &SessionKey) -> Result<()> {
        let session = self.sessions.get_mut(key).ok_or_else(|| SessionError::NotStarted {
            conversation_id: key.conversation_id.clone(),
            participant_id: key.participant_id.clone(),
        })?;
        session.state.reset();
        session.last_marker = None;
        debug!(target: ROOT_LOGGER_NAME, session = %key, "planning session reset");
        Ok(())
    }

    /// Evict a session, returning its final state
    pub fn end(&mut self, key: &SessionKey) -> Option<PlanningSession> {
        let removed = self.sessions.remove(key);
        if removed.is_some() {
            debug!(target: ROOT_LOGGER_NAME, session = %key, "planning session ended");
        }
        removed
    }

    pub fn session(&self, key: &SessionKey) -> Option<&PlanningSession> {
        self.sessions.get(key)
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys of all live sessions, sorted
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn get(&self, key: &SessionKey) -> Result<&PlanningSession> {
        self.sessions.get(key).ok_or_else(|| {
            SessionError::NotStarted {
                conversation_id: key.conversation_id.clone(),
                participant_id: key.participant_id.clone(),
            }
            .into()
        })
    }
}

impl fmt::Debug for PlanningSessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanningSessions")
            .field("strategy", &self.strategy.name())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheWindowError;
    use crate::model_context::RollingStrategyConfig;
    use crate::models::Message;

    fn sessions() -> PlanningSessions {
        PlanningSessions::from_config(&StrategyConfig::Rolling(RollingStrategyConfig {
            max_tokens: 1000,
            max_grace_tokens: 200,
        }))
        .unwrap()
    }

    #[test]
    fn test_prepare_requires_begin() {
        let mut sessions = sessions();
        let key = SessionKey::new("c1", "p1");
        let history = vec![Message::user("hi")];

        let err = sessions.prepare(&key, ContextRequest::new(&history)).unwrap_err();
        assert!(matches!(err, CacheWindowError::Session(SessionError::NotStarted { .. })));
        assert!(err.is_recoverable());

        sessions.begin(key.clone());
        let window = sessions.prepare(&key, ContextRequest::new(&history)).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(sessions.session(&key).unwrap().turns, 1);
        assert_eq!(sessions.session(&key).unwrap().state.last_message_count, 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut sessions = sessions();
        let a = SessionKey::new("c1", "p1");
        let b = SessionKey::new("c1", "p2");
        sessions.begin(a.clone());
        sessions.begin(b.clone());

        let history = vec![Message::user("hi"), Message::assistant("hello")];
        sessions.prepare(&a, ContextRequest::new(&history)).unwrap();

        assert_eq!(sessions.session(&a).unwrap().state.last_message_count, 2);
        assert!(sessions.session(&b).unwrap().state.is_fresh());
        assert_eq!(sessions.keys(), vec![a, b]);
    }

    #[test]
    fn test_reset_and_end() {
        let mut sessions = sessions();
        let key = SessionKey::new("c1", "p1");
        sessions.begin(key.clone());
        sessions
            .prepare(&key, ContextRequest::new(&[Message::user("hi")]))
            .unwrap();

        sessions.reset(&key).unwrap();
        assert!(sessions.session(&key).unwrap().state.is_fresh());

        let ended = sessions.end(&key).unwrap();
        assert_eq!(ended.turns, 1);
        assert!(!sessions.contains(&key));
        assert!(sessions.is_empty());
        assert!(sessions.reset(&key).is_err());
        assert!(sessions.end(&key).is_none());
    }

    #[test]
    fn test_debug_and_display() {
        let sessions = sessions();
        assert_eq!(format!("{:?}", sessions), "PlanningSessions { strategy: \"rolling\", sessions: 0 }");
        assert_eq!(SessionKey::new("c", "p").to_string(), "c/p");
    }
}
