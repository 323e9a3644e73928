//! IRC message prefix types.
//!
//! A prefix identifies the origin of a message: either a server name or a
//! user's `nick!user@host` mask.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// IRC message prefix - identifies the origin of a message.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// Server name (e.g., "irc.example.com")
    ServerName(String),
    /// User prefix: (nickname, username, hostname). Username and hostname
    /// are empty when the server sent a bare nick.
    Nickname(String, String, String),
}

impl Prefix {
    /// Parse a prefix leniently. A name containing a dot and no `!`/`@` is
    /// taken to be a server.
    pub fn new_from_str(s: &str) -> Self {
        let (name, rest) = match s.find(['!', '@']) {
            Some(pos) => (&s[..pos], &s[pos..]),
            None => (s, ""),
        };

        if rest.is_empty() {
            return if name.contains('.') {
                Prefix::ServerName(name.to_string())
            } else {
                Prefix::Nickname(name.to_string(), String::new(), String::new())
            };
        }

        let (user, host) = match rest.strip_prefix('!') {
            Some(after_bang) => match after_bang.split_once('@') {
                Some((user, host)) => (user, host),
                None => (after_bang, ""),
            },
            None => ("", rest.trim_start_matches('@')),
        };

        Prefix::Nickname(name.to_string(), user.to_string(), host.to_string())
    }

    /// The nickname, if this is a user prefix.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }
}

impl FromStr for Prefix {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains(' ') {
            return Err(MessageParseError::InvalidPrefix(s.to_string()));
        }
        Ok(Prefix::new_from_str(s))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}
