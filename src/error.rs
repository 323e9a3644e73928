//! Unified error handling for plugbot.
//!
//! [`ClientError`] is what every public client operation returns. It is
//! `Clone` so the session can keep the error that drove it into `Failed`
//! and hand out copies through [`crate::Client::last_error`].

use std::io;
use std::time::Duration;

use plugbot_proto::ProtocolError;
use thiserror::Error;

use crate::session::ConnectionState;

// ============================================================================
// Transport Errors
// ============================================================================

/// A cloneable snapshot of an I/O failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({kind})")]
pub struct TransportError {
    /// The I/O error kind.
    pub kind: io::ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// Build from a kind and message.
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The peer closed the stream.
    pub fn closed() -> Self {
        Self::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => e.into(),
            other => Self::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Errors surfaced by client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    #[error("already connected")]
    AlreadyConnected,

    #[error("plugin name already registered: {0}")]
    DuplicateName(String),

    #[error("no such plugin: {0}")]
    UnknownPlugin(String),

    #[error("target not in roster: {0}")]
    UnknownTarget(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("plugin {plugin} failed: {message}")]
    PluginCallback { plugin: String, message: String },

    #[error("registration timed out after {0:?}")]
    RegistrationTimeout(Duration),

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Parse(_) => "parse",
            Self::NotConnected { .. } => "not_connected",
            Self::AlreadyConnected => "already_connected",
            Self::DuplicateName(_) => "duplicate_name",
            Self::UnknownPlugin(_) => "unknown_plugin",
            Self::UnknownTarget(_) => "unknown_target",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::InvalidChannel(_) => "invalid_channel",
            Self::PluginCallback { .. } => "plugin_callback",
            Self::RegistrationTimeout(_) => "registration_timeout",
            Self::Rejected(_) => "rejected",
            Self::Config(_) => "config",
        }
    }

    /// Whether this error ends the session (drives the `Failed` state).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RegistrationTimeout(_) | Self::Rejected(_)
        )
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.into())
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Transport(err.into())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

// ============================================================================
// Plugin Errors
// ============================================================================

/// Errors raised by plugin code or while running it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("callback panicked: {0}")]
    Panicked(String),

    #[error("callback timed out after {0:?}")]
    TimedOut(Duration),
}

impl PluginError {
    /// Shorthand for [`PluginError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ClientError::AlreadyConnected.error_code(), "already_connected");
        assert_eq!(
            ClientError::UnknownTarget("bob".into()).error_code(),
            "unknown_target"
        );
    }

    #[test]
    fn test_fatality() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        assert!(ClientError::from(io).is_fatal());
        assert!(!ClientError::InvalidPayload("empty".into()).is_fatal());
        assert!(
            !ClientError::NotConnected {
                state: ConnectionState::Disconnected
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_protocol_error_keeps_io_kind() {
        let err: TransportError =
            ProtocolError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).into();
        assert_eq!(err.kind, io::ErrorKind::ConnectionReset);
    }
}
