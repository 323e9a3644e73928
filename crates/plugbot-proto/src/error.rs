//! Error types for the IRC protocol library.
//!
//! [`ProtocolError`] covers stream-level failures and ends a transport.
//! [`MessageParseError`] covers one bad line and never does.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Stream-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An outgoing line would contain a line break or NUL and break framing.
    #[error("illegal character {0:?} in outgoing line")]
    IllegalOutgoingChar(char),

    /// An outgoing line is longer than the codec allows.
    #[error("outgoing line too long: {actual} bytes (limit: {limit})")]
    OutgoingTooLong {
        /// Actual encoded length, terminator included.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },
}

/// Errors encountered when parsing one IRC line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty (or only whitespace).
    #[error("empty message")]
    EmptyMessage,

    /// Command was missing or not `1*letter / 3digit`.
    #[error("invalid command at position {position} in {line:?}")]
    InvalidCommand {
        /// The offending line.
        line: String,
        /// Byte offset where the parser stopped.
        position: usize,
    },

    /// Not enough arguments for a known command.
    #[error("{command}: expected at least {expected} arguments, got {got}")]
    NotEnoughArguments {
        /// Command name.
        command: String,
        /// Minimum argument count.
        expected: usize,
        /// Actual argument count.
        got: usize,
    },

    /// Line exceeded the maximum frame length and was discarded.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Bytes seen before the line was dropped.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Invalid message prefix.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err: ProtocolError = io_err.into();
        assert!(matches!(err, ProtocolError::Io(_)));
        assert_eq!(err.to_string(), "io error: broken pipe");
    }

    #[test]
    fn test_parse_error_display() {
        let err = MessageParseError::LineTooLong {
            actual: 900,
            limit: 512,
        };
        assert_eq!(err.to_string(), "line too long: 900 bytes (limit: 512)");
    }
}
