//! Per-connection session state.
//!
//! The [`Session`] is owned by the client core and only mutated while the
//! core lock is held. Plugins never see it; they get a [`Snapshot`].

mod roster;

pub use roster::{Person, Privilege, Roster};

use std::fmt;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ClientError;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registering,
    Joined,
    /// Connected with no channel: after `leave()` or mid channel switch.
    Leaving,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// A transport is open and usable for writes.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Registering | Self::Joined | Self::Leaving)
    }

    /// `connect()` may be called from here.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Reconnecting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Joined => "joined",
            Self::Leaving => "leaving",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view handed to plugins on load and to callers of
/// [`crate::Client::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub nick: String,
    pub channel: Option<String>,
    pub topic: Option<String>,
    pub people: Vec<Person>,
}

/// Session state for one server connection.
#[derive(Debug)]
pub struct Session {
    /// `host:port`, for logging.
    pub server: String,
    pub password: Option<String>,
    pub nick: String,
    pub realname: String,
    /// Current channel. Always `Some` while `Joined`.
    pub channel: Option<String>,
    pub topic: Option<String>,
    pub roster: Roster,
    state: ConnectionState,
    last_error: Option<ClientError>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            server: config.server.address(),
            password: config.server.password.clone(),
            nick: config.identity.nick.clone(),
            realname: config.identity.realname.clone(),
            channel: None,
            topic: None,
            roster: Roster::new(),
            state: ConnectionState::Disconnected,
            last_error: None,
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transition and notify watchers. Entering `Joined` without a channel
    /// is refused and leaves the state untouched.
    pub fn set_state(&mut self, next: ConnectionState) {
        if next == ConnectionState::Joined && self.channel.is_none() {
            error!("refusing to enter joined state without a channel");
            return;
        }
        if self.state != next {
            info!(from = %self.state, to = %next, server = %self.server, "state transition");
            self.state = next;
            self.state_tx.send_replace(next);
        }
    }

    /// Record a fatal error and move to `Failed`.
    pub fn fail(&mut self, error: ClientError) {
        warn!(error = %error, code = error.error_code(), "session failed");
        self.last_error = Some(error);
        self.set_state(ConnectionState::Failed);
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Forget channel membership (part, kick, disconnect).
    pub fn clear_channel(&mut self) {
        self.channel = None;
        self.topic = None;
        self.roster.clear();
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            nick: self.nick.clone(),
            channel: self.channel.clone(),
            topic: self.topic.clone(),
            people: self.roster.people(),
        }
    }
}
