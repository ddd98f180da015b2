//! Error handling for cachewindow-core
//!
//! Planning itself never fails: unresolvable content costs zero tokens and an
//! exhausted marker search simply yields fewer markers. Errors only surface at
//! the edges of the crate, when a strategy is configured or when a caller asks
//! for a planning session that was never started.

use thiserror::Error;

/// Result type alias for cachewindow operations
pub type Result<T> = std::result::Result<T, CacheWindowError>;

/// Main error type for the cachewindow-core library
#[derive(Debug, Error)]
pub enum CacheWindowError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Planning session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Settings file or environment loading errors
    #[cfg(feature = "config-support")]
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
    /// TOML parsing errors
    #[cfg(feature = "config-support")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A parameter that must be positive was zero
    #[error("'{key}' must be greater than 0")]
    ZeroValue {
        /// Parameter name
        key: &'static str,
    },
    /// Invalid configuration value
    #[error("Invalid value for '{key}': '{value}' (expected: {expected})")]
    InvalidValue {
        /// Parameter name
        key: &'static str,
        /// Offending value
        value: String,
        /// What the parameter accepts
        expected: String,
    },
}

/// Planning session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `prepare` was called for a session that was never begun or already ended
    #[error("No planning session for conversation '{conversation_id}' and participant '{participant_id}'")]
    NotStarted {
        /// Conversation identifier
        conversation_id: String,
        /// Participant identifier
        participant_id: String,
    },
}

impl CacheWindowError {
    /// Check if this is a recoverable error
    ///
    /// A missing session is recoverable: the caller begins a fresh session and
    /// the next call degrades to a full recompute.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheWindowError::Session(SessionError::NotStarted { .. }))
    }
}
