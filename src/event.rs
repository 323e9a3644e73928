//! Typed inbound events delivered to plugins.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::session::Person;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Message,
    PrivateMessage,
    Join,
    Part,
    Quit,
    Notice,
    TitleChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Message,
        EventKind::PrivateMessage,
        EventKind::Join,
        EventKind::Part,
        EventKind::Quit,
        EventKind::Notice,
        EventKind::TitleChanged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::PrivateMessage => "private_message",
            Self::Join => "join",
            Self::Part => "part",
            Self::Quit => "quit",
            Self::Notice => "notice",
            Self::TitleChanged => "title_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound occurrence. Immutable once built; every subscriber receives
/// an identical copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    person: Person,
    channel: Option<String>,
    timestamp: DateTime<Utc>,
    payload: String,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(
        kind: EventKind,
        person: Person,
        channel: Option<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::at(kind, person, channel, payload, Utc::now())
    }

    /// Build an event with an explicit timestamp.
    pub fn at(
        kind: EventKind,
        person: Person,
        channel: Option<String>,
        payload: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            person,
            channel,
            timestamp,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Who caused the event. For kicks this is the person removed.
    pub fn person(&self) -> &Person {
        &self.person
    }

    /// The channel involved, if any. `None` for private messages and quits.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Message text, part/quit/kick reason or new topic.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}
