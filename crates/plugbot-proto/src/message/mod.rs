//! Owned IRC messages.

mod parse;

use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

use self::parse::ParsedLine;

/// An owned IRC message: optional prefix plus a command.
///
/// ```
/// use plugbot_proto::{Command, Message};
///
/// let msg: Message = "PING :abc123".parse().unwrap();
/// assert_eq!(msg.command, Command::PING("abc123".into()));
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    /// Message source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The IRC command and its parameters.
    pub command: Command,
}

impl Message {
    /// Attach a prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Nickname of the sender, if the prefix is a user mask.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nickname)
    }

    /// Convenience constructor for `PRIVMSG`.
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message {
            prefix: None,
            command,
        }
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let parsed = ParsedLine::parse(line).map_err(|position| {
            MessageParseError::InvalidCommand {
                line: line.to_string(),
                position,
            }
        })?;

        let prefix = parsed.prefix.map(str::parse::<Prefix>).transpose()?;
        let command = Command::new(parsed.command, parsed.params.to_vec())?;

        Ok(Message { prefix, command })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        write!(f, "{}", self.command)
    }
}
