//! Classification of parsed lines and serialization of actions.
//!
//! [`classify`] sorts every inbound [`Message`] into a plugin-facing
//! [`Event`], a [`ControlFrame`] handled by the state machine, or nothing.
//! [`serialize`] turns one [`Action`] into exactly one wire [`Message`].

use plugbot_proto::{ChannelExt, Command, Message, Prefix, irc_eq};
use tracing::trace;

use crate::action::Action;
use crate::error::{ClientError, ClientResult};
use crate::event::{Event, EventKind};
use crate::session::{ConnectionState, Person, Privilege, Roster};

const RPL_WELCOME: u16 = 1;
const RPL_TOPIC: u16 = 332;
const RPL_NAMREPLY: u16 = 353;
const RPL_ENDOFNAMES: u16 = 366;
const ERR_NICKNAMEINUSE: u16 = 433;

/// One `+x nick` / `-x nick` privilege change from a channel MODE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeChange {
    pub nick: String,
    pub privilege: Privilege,
    pub granted: bool,
}

/// Lines consumed by the state machine and never shown to plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// Server heartbeat; answer with the same token.
    Ping(String),
    Pong(String),
    /// RPL_WELCOME, carrying the nick the server registered us under.
    Welcome(String),
    /// RPL_TOPIC sent after a join.
    Topic {
        channel: String,
        topic: String,
    },
    /// One RPL_NAMREPLY batch.
    Names {
        channel: String,
        people: Vec<Person>,
    },
    EndOfNames(String),
    NickInUse(String),
    ServerError(String),
    PrivilegeChange {
        channel: String,
        changes: Vec<PrivilegeChange>,
    },
    NickChange {
        old: String,
        new: String,
    },
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(Event),
    Control(ControlFrame),
    Ignored,
}

fn parse_error(msg: &Message, why: &str) -> ClientError {
    ClientError::Parse(format!("{why}: {msg}"))
}

/// The sender as a roster-aware person. Requires a user prefix.
fn sender(msg: &Message, roster: &Roster) -> ClientResult<Person> {
    match &msg.prefix {
        Some(prefix @ Prefix::Nickname(nick, _, _)) => {
            let seen = Person::from_prefix(prefix);
            Ok(match roster.get(nick) {
                Some(known) => Person {
                    privilege: known.privilege,
                    hostname: if seen.hostname.is_empty() {
                        known.hostname.clone()
                    } else {
                        seen.hostname
                    },
                    display_name: if seen.display_name.is_empty() {
                        known.display_name.clone()
                    } else {
                        seen.display_name
                    },
                    nick: seen.nick,
                },
                None => seen,
            })
        }
        _ => Err(parse_error(msg, "missing user prefix")),
    }
}

/// Parse a NAMES entry list (`@alice +bob carol`).
fn parse_names(list: &str) -> Vec<Person> {
    list.split_whitespace()
        .filter_map(|entry| {
            // Multi-prefix servers may send several sigils; the first is the highest.
            let privilege = entry
                .chars()
                .next()
                .and_then(Privilege::from_prefix)
                .unwrap_or_default();
            let nick = entry.trim_start_matches(|c: char| Privilege::from_prefix(c).is_some());
            // userhost-in-names style entries carry a full mask.
            let prefix = Prefix::new_from_str(nick);
            let person = match prefix {
                Prefix::Nickname(..) => Person::from_prefix(&prefix),
                Prefix::ServerName(_) => Person::new(nick),
            };
            (!person.nick.is_empty()).then(|| person.with_privilege(privilege))
        })
        .collect()
}

/// Extract privilege changes from `MODE #chan +o-v alice bob`. Non-privilege
/// modes are skipped, along with their argument when they take one.
fn parse_privilege_modes(args: &[String]) -> Vec<PrivilegeChange> {
    let Some((modes, params)) = args.split_first() else {
        return Vec::new();
    };
    let mut params = params.iter();
    let mut granted = true;
    let mut changes = Vec::new();

    for c in modes.chars() {
        match c {
            '+' => granted = true,
            '-' => granted = false,
            // Modes that consume an argument in both directions.
            'b' | 'e' | 'I' | 'k' => {
                params.next();
            }
            // Limit only takes an argument when set.
            'l' if granted => {
                params.next();
            }
            _ => {
                if let Some(privilege) = Privilege::from_mode(c)
                    && let Some(nick) = params.next()
                {
                    changes.push(PrivilegeChange {
                        nick: nick.clone(),
                        privilege,
                        granted,
                    });
                }
            }
        }
    }
    changes
}

/// Sort one parsed line. `own_nick` tells channel messages from private
/// ones; `roster` supplies known privileges for the sender.
pub fn classify(msg: Message, own_nick: &str, roster: &Roster) -> ClientResult<Inbound> {
    let inbound = match &msg.command {
        Command::PING(token) => Inbound::Control(ControlFrame::Ping(token.clone())),
        Command::PONG(token) => Inbound::Control(ControlFrame::Pong(token.clone())),
        Command::ERROR(text) => Inbound::Control(ControlFrame::ServerError(text.clone())),

        Command::PRIVMSG(target, text) => {
            let person = sender(&msg, roster)?;
            if target.is_channel_name() {
                Inbound::Event(Event::new(
                    EventKind::Message,
                    person,
                    Some(target.clone()),
                    text.clone(),
                ))
            } else {
                Inbound::Event(Event::new(EventKind::PrivateMessage, person, None, text.clone()))
            }
        }
        Command::NOTICE(target, text) => match &msg.prefix {
            // Server notices (connection banners) are not events.
            Some(Prefix::Nickname(..)) => {
                let channel = target.is_channel_name().then(|| target.clone());
                Inbound::Event(Event::new(
                    EventKind::Notice,
                    sender(&msg, roster)?,
                    channel,
                    text.clone(),
                ))
            }
            _ => Inbound::Ignored,
        },
        Command::JOIN(channel, _) => Inbound::Event(Event::new(
            EventKind::Join,
            sender(&msg, roster)?,
            Some(channel.clone()),
            "",
        )),
        Command::PART(channel, reason) => Inbound::Event(Event::new(
            EventKind::Part,
            sender(&msg, roster)?,
            Some(channel.clone()),
            reason.clone().unwrap_or_default(),
        )),
        Command::QUIT(reason) => Inbound::Event(Event::new(
            EventKind::Quit,
            sender(&msg, roster)?,
            None,
            reason.clone().unwrap_or_default(),
        )),
        Command::TOPIC(channel, Some(topic)) => Inbound::Event(Event::new(
            EventKind::TitleChanged,
            sender(&msg, roster)?,
            Some(channel.clone()),
            topic.clone(),
        )),
        Command::KICK(channel, victim, reason) => {
            let person = roster
                .get(victim)
                .cloned()
                .unwrap_or_else(|| Person::new(victim.clone()));
            Inbound::Event(Event::new(
                EventKind::Part,
                person,
                Some(channel.clone()),
                reason.clone().unwrap_or_default(),
            ))
        }
        Command::NICK(new) => {
            let old = msg
                .source_nickname()
                .ok_or_else(|| parse_error(&msg, "missing user prefix"))?;
            Inbound::Control(ControlFrame::NickChange {
                old: old.to_string(),
                new: new.clone(),
            })
        }
        Command::MODE(target, args) if target.is_channel_name() => {
            let changes = parse_privilege_modes(args);
            if changes.is_empty() {
                Inbound::Ignored
            } else {
                Inbound::Control(ControlFrame::PrivilegeChange {
                    channel: target.clone(),
                    changes,
                })
            }
        }

        Command::Response(RPL_WELCOME, args) => Inbound::Control(ControlFrame::Welcome(
            args.first().cloned().unwrap_or_else(|| own_nick.to_string()),
        )),
        Command::Response(RPL_TOPIC, args) => {
            // <me> <channel> :<topic>
            if args.len() < 3 {
                return Err(parse_error(&msg, "short RPL_TOPIC"));
            }
            Inbound::Control(ControlFrame::Topic {
                channel: args[1].clone(),
                topic: args[2].clone(),
            })
        }
        Command::Response(RPL_NAMREPLY, args) => {
            // <me> [=*@] <channel> :<names>
            if args.len() < 3 {
                return Err(parse_error(&msg, "short RPL_NAMREPLY"));
            }
            let channel = args[args.len() - 2].clone();
            Inbound::Control(ControlFrame::Names {
                channel,
                people: parse_names(&args[args.len() - 1]),
            })
        }
        Command::Response(RPL_ENDOFNAMES, args) => Inbound::Control(ControlFrame::EndOfNames(
            args.get(1).cloned().unwrap_or_default(),
        )),
        Command::Response(ERR_NICKNAMEINUSE, args) => Inbound::Control(ControlFrame::NickInUse(
            args.get(1).cloned().unwrap_or_else(|| own_nick.to_string()),
        )),

        _ => Inbound::Ignored,
    };

    if matches!(inbound, Inbound::Ignored) {
        trace!(command = %msg.command.name(), "ignored frame");
    }
    Ok(inbound)
}

/// Whether an event was caused by us.
pub fn is_own(event: &Event, own_nick: &str) -> bool {
    irc_eq(&event.person().nick, own_nick)
}

/// What [`serialize`] needs to know about the session.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub state: ConnectionState,
    pub channel: Option<&'a str>,
    pub roster: &'a Roster,
}

impl<'a> ActionContext<'a> {
    fn channel(&self) -> ClientResult<&'a str> {
        self.channel
            .ok_or(ClientError::NotConnected { state: self.state })
    }
}

/// Ban mask for a nick: by host when the roster knows it.
pub fn ban_mask(nick: &str, roster: &Roster) -> String {
    match roster.get(nick) {
        Some(person) if !person.hostname.is_empty() => format!("*!*@{}", person.hostname),
        _ => format!("{nick}!*@*"),
    }
}

/// Turn one action into one line. Channel-bound actions need a channel.
pub fn serialize(action: &Action, ctx: &ActionContext<'_>) -> ClientResult<Message> {
    let command = match action {
        Action::SendMessage { body } => Command::PRIVMSG(ctx.channel()?.to_string(), body.clone()),
        Action::SendPrivateMessage { nick, body } => Command::PRIVMSG(nick.clone(), body.clone()),
        Action::Kick { nick, reason } => {
            Command::KICK(ctx.channel()?.to_string(), nick.clone(), reason.clone())
        }
        Action::Ban { nick } => Command::MODE(
            ctx.channel()?.to_string(),
            vec!["+b".to_string(), ban_mask(nick, ctx.roster)],
        ),
    };
    Ok(Message::from(command))
}
