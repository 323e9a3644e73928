//! IRC command types.
//!
//! Only the commands a bot client sends or reacts to are modelled. Anything
//! else parses into [`Command::Raw`] so it still round-trips.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol

use std::fmt::{self, Write};

use crate::error::MessageParseError;

/// IRC command with its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// `PASS password`
    PASS(String),
    /// `NICK nickname`
    NICK(String),
    /// `USER username mode unused realname`
    USER(String, String, String, String),
    /// `JOIN channel [key]`
    JOIN(String, Option<String>),
    /// `PART channel [message]`
    PART(String, Option<String>),
    /// `QUIT [message]`
    QUIT(Option<String>),
    /// `PRIVMSG target text`
    PRIVMSG(String, String),
    /// `NOTICE target text`
    NOTICE(String, String),
    /// `PING token`. When parsing, the last argument is the token.
    PING(String),
    /// `PONG token`. When parsing, the last argument is the token, so
    /// `:srv PONG srv :abc` yields `abc`.
    PONG(String),
    /// `TOPIC channel [topic]`
    TOPIC(String, Option<String>),
    /// `KICK channel nick [reason]`
    KICK(String, String, Option<String>),
    /// `MODE target [modestring [args...]]`
    MODE(String, Vec<String>),
    /// `ERROR message`
    ERROR(String),
    /// Numeric reply: code and arguments.
    Response(u16, Vec<String>),
    /// Any other command, verbatim.
    Raw(String, Vec<String>),
}

impl Command {
    /// Build a command from its name and arguments.
    ///
    /// Known commands with too few arguments are an error; unknown commands
    /// are kept as [`Command::Raw`].
    pub fn new(name: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        let upper = name.to_ascii_uppercase();

        if upper.len() == 3 && upper.bytes().all(|b| b.is_ascii_digit()) {
            let code = upper.parse::<u16>().map_err(|_| MessageParseError::InvalidCommand {
                line: name.to_string(),
                position: 0,
            })?;
            return Ok(Command::Response(code, owned(&args)));
        }

        let need = |n: usize| -> Result<(), MessageParseError> {
            if args.len() < n {
                Err(MessageParseError::NotEnoughArguments {
                    command: upper.clone(),
                    expected: n,
                    got: args.len(),
                })
            } else {
                Ok(())
            }
        };
        let opt = |i: usize| args.get(i).map(|s| s.to_string());

        let cmd = match upper.as_str() {
            "PASS" => {
                need(1)?;
                Command::PASS(args[0].to_string())
            }
            "NICK" => {
                need(1)?;
                Command::NICK(args[0].to_string())
            }
            "USER" => {
                need(4)?;
                Command::USER(
                    args[0].to_string(),
                    args[1].to_string(),
                    args[2].to_string(),
                    args[3].to_string(),
                )
            }
            "JOIN" => {
                need(1)?;
                Command::JOIN(args[0].to_string(), opt(1))
            }
            "PART" => {
                need(1)?;
                Command::PART(args[0].to_string(), opt(1))
            }
            "QUIT" => Command::QUIT(opt(0)),
            "PRIVMSG" => {
                need(2)?;
                Command::PRIVMSG(args[0].to_string(), args[1].to_string())
            }
            "NOTICE" => {
                need(2)?;
                Command::NOTICE(args[0].to_string(), args[1].to_string())
            }
            "PING" => {
                need(1)?;
                Command::PING(args[args.len() - 1].to_string())
            }
            "PONG" => {
                need(1)?;
                Command::PONG(args[args.len() - 1].to_string())
            }
            "TOPIC" => {
                need(1)?;
                Command::TOPIC(args[0].to_string(), opt(1))
            }
            "KICK" => {
                need(2)?;
                Command::KICK(args[0].to_string(), args[1].to_string(), opt(2))
            }
            "MODE" => {
                need(1)?;
                Command::MODE(args[0].to_string(), owned(&args[1..]))
            }
            "ERROR" => Command::ERROR(opt(0).unwrap_or_default()),
            _ => Command::Raw(name.to_ascii_uppercase(), owned(&args)),
        };
        Ok(cmd)
    }

    /// The command name as sent on the wire (numerics zero-padded).
    pub fn name(&self) -> String {
        match self {
            Command::PASS(_) => "PASS".into(),
            Command::NICK(_) => "NICK".into(),
            Command::USER(..) => "USER".into(),
            Command::JOIN(..) => "JOIN".into(),
            Command::PART(..) => "PART".into(),
            Command::QUIT(_) => "QUIT".into(),
            Command::PRIVMSG(..) => "PRIVMSG".into(),
            Command::NOTICE(..) => "NOTICE".into(),
            Command::PING(_) => "PING".into(),
            Command::PONG(_) => "PONG".into(),
            Command::TOPIC(..) => "TOPIC".into(),
            Command::KICK(..) => "KICK".into(),
            Command::MODE(..) => "MODE".into(),
            Command::ERROR(_) => "ERROR".into(),
            Command::Response(code, _) => format!("{code:03}"),
            Command::Raw(name, _) => name.clone(),
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// A trailing parameter needs the `:` marker when it is empty, contains a
/// space or itself starts with `:`.
fn needs_colon_prefix(arg: &str) -> bool {
    arg.is_empty() || arg.contains(' ') || arg.starts_with(':')
}

/// Write `CMD a b :last`, adding the colon to the last argument only when
/// needed.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    if let Some((last, middle)) = args.split_last() {
        for arg in middle {
            f.write_char(' ')?;
            f.write_str(arg)?;
        }
        f.write_char(' ')?;
        if needs_colon_prefix(last) {
            f.write_char(':')?;
        }
        f.write_str(last)?;
    }
    Ok(())
}

/// Write `CMD a b :last`, always marking the last argument as trailing.
/// Used for free-form text (message bodies, reasons, realnames).
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    if let Some((last, middle)) = args.split_last() {
        for arg in middle {
            f.write_char(' ')?;
            f.write_str(arg)?;
        }
        f.write_str(" :")?;
        f.write_str(last)?;
    }
    Ok(())
}

fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PASS(p) => write_cmd(f, "PASS", &[p]),
            Command::NICK(n) => write_cmd(f, "NICK", &[n]),
            Command::USER(u, m, x, r) => write_cmd_freeform(f, "USER", &[u, m, x, r]),
            Command::JOIN(c, Some(k)) => write_cmd(f, "JOIN", &[c, k]),
            Command::JOIN(c, None) => write_cmd(f, "JOIN", &[c]),
            Command::PART(c, Some(m)) => write_cmd_freeform(f, "PART", &[c, m]),
            Command::PART(c, None) => write_cmd(f, "PART", &[c]),
            Command::QUIT(Some(m)) => write_cmd_freeform(f, "QUIT", &[m]),
            Command::QUIT(None) => write_cmd(f, "QUIT", &[]),
            Command::PRIVMSG(t, m) => write_cmd_freeform(f, "PRIVMSG", &[t, m]),
            Command::NOTICE(t, m) => write_cmd_freeform(f, "NOTICE", &[t, m]),
            Command::PING(t) => write_cmd_freeform(f, "PING", &[t]),
            Command::PONG(t) => write_cmd_freeform(f, "PONG", &[t]),
            Command::TOPIC(c, Some(t)) => write_cmd_freeform(f, "TOPIC", &[c, t]),
            Command::TOPIC(c, None) => write_cmd(f, "TOPIC", &[c]),
            Command::KICK(c, n, Some(r)) => write_cmd_freeform(f, "KICK", &[c, n, r]),
            Command::KICK(c, n, None) => write_cmd(f, "KICK", &[c, n]),
            Command::MODE(t, args) => {
                let mut all = vec![t.as_str()];
                all.extend(as_strs(args));
                write_cmd(f, "MODE", &all)
            }
            Command::ERROR(m) => write_cmd_freeform(f, "ERROR", &[m]),
            Command::Response(code, args) => write_cmd(f, &format!("{code:03}"), &as_strs(args)),
            Command::Raw(name, args) => write_cmd(f, name, &as_strs(args)),
        }
    }
}
