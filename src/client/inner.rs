//! State guarded by the session lock and the transitions that run under it.

use std::time::Duration;

use plugbot_proto::{
    ChannelExt, Command, LineReader, LineWriter, Message, ReadOutcome, irc_eq, read_message,
    write_message,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};

use crate::action::ActionMap;
use crate::codec::{self, ActionContext, ControlFrame, Inbound};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::event::{Event, EventKind};
use crate::executor::{self, ExecutionReport};
use crate::plugin::PluginHost;
use crate::session::{ConnectionState, Session};
use crate::telemetry::{DispatchTimer, spans};

pub(crate) struct Core {
    pub(crate) session: Session,
    pub(crate) writer: Option<LineWriter>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) plugins: PluginHost,
    /// Fired by `quit` and by fatal errors raised outside the receive loop.
    pub(crate) cancel: CancellationToken,
    /// Set while a channel switch waits for the server's JOIN echo.
    pub(crate) join_deadline: Option<Instant>,
    pub(crate) last_activity: Instant,
    pub(crate) ping_sent: bool,
    registration_timeout: Duration,
}

impl Core {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            session: Session::new(config),
            writer: None,
            dispatcher: Dispatcher::new(config.bot.callback_timeout()),
            plugins: PluginHost::new(config.bot.max_consecutive_failures),
            cancel: CancellationToken::new(),
            join_deadline: None,
            last_activity: Instant::now(),
            ping_sent: false,
            registration_timeout: config.bot.registration_timeout(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub(crate) fn not_connected(&self) -> ClientError {
        ClientError::NotConnected {
            state: self.state(),
        }
    }

    /// Write one line.
    pub(crate) async fn send(&mut self, msg: Message) -> ClientResult<()> {
        let state = self.state();
        let writer = self
            .writer
            .as_mut()
            .ok_or(ClientError::NotConnected { state })?;
        debug!(line = %msg, "send");
        write_message(writer, msg).await?;
        Ok(())
    }

    /// Enter `Failed`: drop the writer, keep the error, stop the loop.
    pub(crate) fn fail(&mut self, error: ClientError) {
        self.writer = None;
        self.join_deadline = None;
        self.session.clear_channel();
        self.session.fail(error);
        self.cancel.cancel();
    }

    /// Reset per-connection state before a fresh connect.
    pub(crate) fn reset(&mut self) {
        self.session.clear_error();
        self.session.clear_channel();
        self.cancel = CancellationToken::new();
        self.join_deadline = None;
        self.last_activity = Instant::now();
        self.ping_sent = false;
    }

    /// Send the handshake and read until the server echoes our JOIN.
    /// No events are dispatched while this runs.
    pub(crate) async fn register(
        &mut self,
        reader: &mut LineReader,
        channel: &str,
    ) -> ClientResult<()> {
        let nick = self.session.nick.clone();
        let mut handshake = Vec::with_capacity(4);
        if let Some(password) = &self.session.password {
            handshake.push(Command::PASS(password.clone()));
        }
        handshake.push(Command::USER(
            nick.clone(),
            "0".into(),
            nick.clone(),
            self.session.realname.clone(),
        ));
        handshake.push(Command::NICK(nick));
        handshake.push(Command::JOIN(channel.to_string(), None));
        for command in handshake {
            self.send(Message::from(command)).await?;
        }

        let deadline = Instant::now() + self.registration_timeout;
        loop {
            let outcome = tokio::time::timeout_at(deadline, read_message(reader))
                .await
                .map_err(|_| ClientError::RegistrationTimeout(self.registration_timeout))??;
            let msg = match outcome {
                ReadOutcome::Message(msg) => msg,
                ReadOutcome::Malformed(e) => {
                    warn!(error = %e, "discarding malformed line");
                    continue;
                }
                ReadOutcome::Closed => return Err(TransportError::closed().into()),
            };
            self.last_activity = Instant::now();

            let inbound = match codec::classify(msg, &self.session.nick, &self.session.roster) {
                Ok(inbound) => inbound,
                Err(e) => {
                    warn!(error = %e, "discarding unparseable line");
                    continue;
                }
            };
            match inbound {
                Inbound::Control(ControlFrame::Ping(token)) => {
                    self.send(Message::from(Command::PONG(token))).await?;
                }
                Inbound::Control(ControlFrame::Welcome(nick)) => {
                    if !nick.is_empty() && nick != self.session.nick {
                        info!(requested = %self.session.nick, granted = %nick, "server changed our nick");
                        self.session.nick = nick;
                    }
                    info!(server = %self.session.server, "registered");
                }
                Inbound::Control(ControlFrame::NickInUse(nick)) => {
                    return Err(ClientError::Rejected(format!(
                        "nickname {nick} is already in use"
                    )));
                }
                Inbound::Control(ControlFrame::ServerError(text)) => {
                    return Err(ClientError::Rejected(text));
                }
                Inbound::Control(ControlFrame::Topic { channel: c, topic }) if irc_eq(&c, channel) => {
                    self.session.topic = Some(topic);
                }
                Inbound::Control(ControlFrame::Names { channel: c, people }) if irc_eq(&c, channel) => {
                    for person in people {
                        self.session.roster.upsert(person);
                    }
                }
                Inbound::Event(event)
                    if event.kind() == EventKind::Join
                        && codec::is_own(&event, &self.session.nick)
                        && event.channel().is_some_and(|c| irc_eq(c, channel)) =>
                {
                    self.session.roster.upsert(event.person().clone());
                    self.session.channel = event.channel().map(str::to_string);
                    self.session.set_state(ConnectionState::Joined);
                    info!(channel = %channel, "joined");
                    return Ok(());
                }
                other => trace!(frame = ?other, "not handled during registration"),
            }
        }
    }

    /// Send PART (when switching) then JOIN, and wait in `Registering` for
    /// the receive loop to see the echo.
    pub(crate) async fn switch_channel(&mut self, old: Option<&str>, new: &str) -> ClientResult<()> {
        if let Some(old) = old {
            self.send(Message::from(Command::PART(old.to_string(), None)))
                .await?;
        }
        self.session.clear_channel();
        self.session.set_state(ConnectionState::Registering);
        self.send(Message::from(Command::JOIN(new.to_string(), None)))
            .await?;
        self.session.channel = Some(new.to_string());
        self.join_deadline = Some(Instant::now() + self.registration_timeout);
        Ok(())
    }

    pub(crate) fn join_timed_out(&self) -> bool {
        self.state() == ConnectionState::Registering
            && self.join_deadline.is_some_and(|d| d <= Instant::now())
    }

    pub(crate) fn registration_timeout(&self) -> Duration {
        self.registration_timeout
    }

    fn in_current_channel(&self, channel: Option<&str>) -> bool {
        matches!((channel, self.session.channel.as_deref()), (Some(a), Some(b)) if irc_eq(a, b))
    }

    /// Process one parsed line from the receive loop.
    pub(crate) async fn handle(&mut self, msg: Message) -> ClientResult<()> {
        if self.cancel.is_cancelled() || !self.state().is_connected() {
            debug!(state = %self.state(), "dropping line read after the session ended");
            return Ok(());
        }
        self.last_activity = Instant::now();
        self.ping_sent = false;

        let inbound = match codec::classify(msg, &self.session.nick, &self.session.roster) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "discarding unparseable line");
                return Ok(());
            }
        };
        match inbound {
            Inbound::Ignored => Ok(()),
            Inbound::Control(frame) => self.apply_control(frame).await,
            Inbound::Event(event) => {
                self.track(&event);
                self.dispatch_and_execute(event).await
            }
        }
    }

    async fn apply_control(&mut self, frame: ControlFrame) -> ClientResult<()> {
        match frame {
            ControlFrame::Ping(token) => {
                self.send(Message::from(Command::PONG(token))).await?;
            }
            ControlFrame::Pong(token) => debug!(token = %token, "pong"),
            ControlFrame::Names { channel, people } => {
                if self.in_current_channel(Some(&channel)) {
                    for person in people {
                        self.session.roster.upsert(person);
                    }
                }
            }
            ControlFrame::Topic { channel, topic } => {
                if self.in_current_channel(Some(&channel)) {
                    self.session.topic = Some(topic);
                }
            }
            ControlFrame::EndOfNames(channel) => {
                debug!(channel = %channel, people = self.session.roster.len(), "names complete");
            }
            ControlFrame::PrivilegeChange { channel, changes } => {
                if self.in_current_channel(Some(&channel)) {
                    for change in changes {
                        self.session
                            .roster
                            .apply_mode(&change.nick, change.privilege, change.granted);
                    }
                }
            }
            ControlFrame::NickChange { old, new } => {
                self.session.roster.rename(&old, &new);
                if irc_eq(&old, &self.session.nick) {
                    info!(old = %old, new = %new, "our nick changed");
                    self.session.nick = new;
                }
            }
            ControlFrame::NickInUse(nick) => warn!(nick = %nick, "nickname in use"),
            ControlFrame::Welcome(_) => {}
            ControlFrame::ServerError(text) => return Err(ClientError::Rejected(text)),
        }
        Ok(())
    }

    /// Roster and channel bookkeeping for an event, before plugins see it.
    fn track(&mut self, event: &Event) {
        let own = codec::is_own(event, &self.session.nick);
        let here = self.in_current_channel(event.channel());
        let person = event.person();

        match event.kind() {
            EventKind::Join if here => {
                self.session.roster.upsert(person.clone());
                if own && self.state() == ConnectionState::Registering {
                    self.join_deadline = None;
                    self.session.set_state(ConnectionState::Joined);
                    info!(channel = ?self.session.channel, "joined");
                }
            }
            EventKind::Part if here => {
                if own {
                    if self.state() == ConnectionState::Joined {
                        info!(channel = ?self.session.channel, reason = %event.payload(), "removed from channel");
                        self.session.clear_channel();
                        self.session.set_state(ConnectionState::Leaving);
                    }
                } else {
                    self.session.roster.remove(&person.nick);
                }
            }
            EventKind::Quit => {
                self.session.roster.remove(&person.nick);
            }
            EventKind::TitleChanged if here => {
                self.session.topic = Some(event.payload().to_string());
            }
            EventKind::Message | EventKind::Notice if here => {
                // Fills in hostnames the NAMES reply could not supply.
                if self.session.roster.contains(&person.nick) {
                    self.session.roster.upsert(person.clone());
                }
            }
            _ => {}
        }
    }

    async fn dispatch_and_execute(&mut self, event: Event) -> ClientResult<()> {
        let span = spans::dispatch(event.kind().as_str(), &event.person().nick, event.channel());
        self.dispatch_cycle(&event).instrument(span).await
    }

    async fn dispatch_cycle(&mut self, event: &Event) -> ClientResult<()> {
        let _timer = DispatchTimer::new(event.kind(), self.dispatcher.timeout());
        let outcome = self.dispatcher.dispatch(event).await;
        self.plugins.record_outcome(&outcome, &mut self.dispatcher);
        if outcome.actions.is_empty() {
            return Ok(());
        }
        let report = self.execute(&outcome.actions).await?;
        debug!(
            sent = report.sent.len(),
            rejected = report.rejected.len(),
            "actions executed"
        );
        Ok(())
    }

    /// Run a batch against the current session.
    pub(crate) async fn execute(&mut self, actions: &ActionMap) -> ClientResult<ExecutionReport> {
        if !self.state().is_connected() {
            return Err(self.not_connected());
        }
        let ctx = ActionContext {
            state: self.session.state(),
            channel: self.session.channel.as_deref(),
            roster: &self.session.roster,
        };
        let state = ctx.state;
        let writer = self
            .writer
            .as_mut()
            .ok_or(ClientError::NotConnected { state })?;
        executor::execute(actions, &ctx, writer).await
    }

    /// Whether `channel` may be joined.
    pub(crate) fn check_channel(channel: &str) -> ClientResult<()> {
        if channel.is_channel_name() {
            Ok(())
        } else {
            Err(ClientError::InvalidChannel(channel.to_string()))
        }
    }
}
