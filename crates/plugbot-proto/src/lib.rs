//! # plugbot-proto
//!
//! Wire-level IRC support for the plugbot client: CRLF line framing,
//! message parsing and serialization, and an async line transport.
//!
//! ## Quick Start
//!
//! ```rust
//! use plugbot_proto::{Command, Message};
//!
//! let msg: Message = ":alice!a@host PRIVMSG #rust :hello there".parse().unwrap();
//! assert_eq!(msg.source_nickname(), Some("alice"));
//!
//! let reply = Message::from(Command::PRIVMSG("#rust".into(), "hi".into()));
//! assert_eq!(reply.to_string(), "PRIVMSG #rust :hi");
//! ```
//!
//! Per-line problems (garbage input, over-long lines) are yielded as items by
//! [`IrcCodec`] rather than as stream errors, so one bad line never ends a
//! read loop.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod names;
pub mod prefix;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::command::Command;
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::names::{irc_eq, irc_to_lower, ChannelExt, NickExt, DEFAULT_NICK_MAX_LEN};
pub use self::prefix::Prefix;
#[cfg(feature = "tokio")]
pub use self::transport::{
    read_message, write_message, IrcStream, LineReader, LineWriter, ReadOutcome, Transport,
};

/// Maximum length of one IRC line in bytes, including the CR LF terminator.
pub const MAX_LINE_LEN: usize = 512;

/// The line terminator used on the wire.
pub const LINE_TERMINATOR: &str = "\r\n";
