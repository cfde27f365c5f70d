//! Error types for status tracking
//!
//! Provides error handling for:
//! - Fetching status from the backend (poll errors)
//! - Decoding backend push messages
//! - Loading and validating configuration

use crate::types::SessionId;
use std::path::PathBuf;

/// Errors raised while fetching a status snapshot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Network or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Backend answered with an error status
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Backend has no such session
    #[error("unknown session: {0}")]
    NotFound(SessionId),

    /// Status channel closed
    #[error("status channel closed")]
    ChannelClosed,
}

impl PollError {
    /// Check if retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Backend { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::ChannelClosed => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or type error
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main error type for status decoding and setup
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Malformed or unknown push message
    #[error("failed to decode status message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Message lacked a required field
    #[error("status message missing field '{0}'")]
    MissingField(&'static str),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error reading a file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StatusError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias
pub type Result<T, E = StatusError> = std::result::Result<T, E>;
