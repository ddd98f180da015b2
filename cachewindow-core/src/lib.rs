//! # cachewindow-core
//!
//! Context-window and cache-breakpoint planning for conversational model
//! clients. Given the ordered messages of a conversation, a strategy decides
//! which messages are sent to the model this turn and where the provider's
//! prompt-cache breakpoints are placed.
//!
//! ## Features
//!
//! - **Token estimation**: fast character-based estimates, pluggable through
//!   [`TokenEstimator`](model_context::TokenEstimator)
//! - **Cache markers**: up to four breakpoints per turn, always on user
//!   messages and above the provider's minimum cacheable size
//! - **Strategies**: append-only, rolling window with a grace period, and
//!   message-count windowing
//! - **Sessions**: per-conversation planning state kept by the caller
//!
//! ## Quick Start
//!
//! ```rust
//! use cachewindow_core::model_context::{ContextRequest, ContextStrategy, RollingState, StrategyConfig};
//! use cachewindow_core::models::Message;
//!
//! let strategy = StrategyConfig::default().build().unwrap();
//! let history = vec![Message::user("What is a prompt cache?")];
//!
//! let (window, state) = strategy.prepare_context(
//!     RollingState::default(),
//!     ContextRequest::new(&history).with_new_message(Message::assistant("A stored prefix.")),
//! );
//! assert_eq!(window.messages.len(), 2);
//! assert_eq!(state.last_message_count, 2);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

// Error types (must be first for other modules to use)
pub mod error;

pub mod constants;
pub mod logging;
pub mod models;
pub mod model_context;
pub mod state_manager;

// === Core Re-exports ===
pub use error::{CacheWindowError, ConfigError, Result, SessionError};
pub use models::{Branch, BranchId, Message, MessageId, Role};
pub use model_context::{
    CacheMarker, CacheMarkerPlanner, ContextRequest, ContextStrategy, ContextWindow, RollingState,
    StrategyConfig, TokenEstimator,
};
pub use state_manager::{PlanningSession, PlanningSessions, SessionKey};

/// Current version of cachewindow-core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
