//! The connection state machine.
//!
//! [`Client`] is a cheap handle over shared state. All transitions take the
//! session lock, so `join`, `quit` and friends can be called from any task
//! while [`Client::run`] is reading. The reader sits in its own slot outside
//! that lock: a read blocked on the network never holds up a transition, and
//! `quit` unblocks it through a cancellation token.
//!
//! Lock order is session, then reader slot.

mod connector;
mod inner;
mod receive;
mod supervisor;

pub use connector::{Connector, TcpConnector};

use std::sync::Arc;

use futures_util::SinkExt;
use plugbot_proto::{Command, LineReader, Message, write_message};
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, info, warn};

use self::inner::Core;
use crate::action::ActionMap;
use crate::config::{self, Config};
use crate::error::{ClientError, ClientResult, TransportError};
use crate::executor::ExecutionReport;
use crate::plugin::{Plugin, PluginHealth};
use crate::session::{ConnectionState, Snapshot};

struct Shared {
    core: Mutex<Core>,
    reader: Mutex<Option<LineReader>>,
    state_rx: watch::Receiver<ConnectionState>,
    /// Tells the receive loop to re-read its timers.
    wake: Notify,
    connector: Arc<dyn Connector>,
    config: Config,
}

/// Handle to one bot connection. Clones share the same session.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Build a TCP client. The config is validated first.
    pub fn new(config: Config) -> ClientResult<Self> {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Build a client that opens its stream through `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> ClientResult<Self> {
        if let Err(errors) = config::validate(&config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Config(joined));
        }

        let core = Core::new(&config);
        let state_rx = core.session.subscribe();
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                reader: Mutex::new(None),
                state_rx,
                wake: Notify::new(),
                connector,
                config,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Current state, without waiting for the session lock.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_rx.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.shared.core.lock().await.session.snapshot()
    }

    /// The error that last drove the session into `Failed`.
    pub async fn last_error(&self) -> Option<ClientError> {
        self.shared.core.lock().await.session.last_error().cloned()
    }

    /// Open the transport, register and join the configured channel.
    ///
    /// Returns once the server has echoed our JOIN. Errors leave the client
    /// in `Failed` with the error retained.
    pub async fn connect(&self) -> ClientResult<()> {
        let mut core = self.shared.core.lock().await;
        if !core.state().can_connect() {
            return Err(ClientError::AlreadyConnected);
        }
        core.reset();
        core.session.set_state(ConnectionState::Connecting);

        let server = &self.shared.config.server;
        let timeout = core.registration_timeout();
        info!(host = %server.host, port = server.port, "connecting");
        let transport = match tokio::time::timeout(
            timeout,
            self.shared.connector.connect(&server.host, server.port),
        )
        .await
        {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                let err = ClientError::from(e);
                core.fail(err.clone());
                return Err(err);
            }
            Err(_) => {
                let err = ClientError::Transport(TransportError::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ));
                core.fail(err.clone());
                return Err(err);
            }
        };

        let (mut reader, writer) = transport.split();
        core.writer = Some(writer);
        core.session.set_state(ConnectionState::Registering);

        if let Err(err) = core.register(&mut reader, &self.shared.config.bot.channel).await {
            core.fail(err.clone());
            return Err(err);
        }
        *self.shared.reader.lock().await = Some(reader);
        Ok(())
    }

    /// Move to another channel.
    ///
    /// From `Joined` this writes exactly one PART and one JOIN; the session
    /// channel changes only once both are written. The receive loop confirms
    /// the join.
    pub async fn join(&self, channel: &str) -> ClientResult<()> {
        Core::check_channel(channel)?;
        let mut core = self.shared.core.lock().await;
        let old = match core.state() {
            ConnectionState::Joined => {
                let old = core.session.channel.clone();
                core.session.set_state(ConnectionState::Leaving);
                old
            }
            ConnectionState::Leaving => None,
            _ => return Err(core.not_connected()),
        };

        if let Err(err) = core.switch_channel(old.as_deref(), channel).await {
            if err.is_fatal() {
                core.fail(err.clone());
            }
            return Err(err);
        }
        self.shared.wake.notify_one();
        info!(from = ?old, to = %channel, "switching channel");
        Ok(())
    }

    /// Part the current channel and stay connected in `Leaving`.
    pub async fn leave(&self) -> ClientResult<()> {
        let mut core = self.shared.core.lock().await;
        match core.state() {
            ConnectionState::Joined => {}
            ConnectionState::Leaving => return Ok(()),
            _ => return Err(core.not_connected()),
        }

        let channel = core.session.channel.clone();
        core.session.set_state(ConnectionState::Leaving);
        if let Some(channel) = channel {
            if let Err(err) = core.send(Message::from(Command::PART(channel.clone(), None))).await {
                core.fail(err.clone());
                return Err(err);
            }
            info!(channel = %channel, "left channel");
        }
        core.session.clear_channel();
        Ok(())
    }

    /// Say goodbye and release the connection. Idempotent.
    pub async fn quit(&self, message: &str) -> ClientResult<()> {
        let mut core = self.shared.core.lock().await;
        if core.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        if let Some(mut writer) = core.writer.take() {
            let quit = Message::from(Command::QUIT(Some(message.to_string())));
            if let Err(e) = write_message(&mut writer, quit).await {
                warn!(error = %e, "failed to send QUIT");
            } else if let Err(e) = writer.close().await {
                debug!(error = %e, "failed to close writer");
            }
        }
        core.cancel.cancel();
        core.join_deadline = None;
        core.session.clear_channel();
        self.shared.reader.lock().await.take();
        core.session.set_state(ConnectionState::Disconnected);
        info!("disconnected");
        Ok(())
    }

    /// Send `PING :<unix millis>` and return the token.
    pub async fn ping(&self) -> ClientResult<String> {
        let mut core = self.shared.core.lock().await;
        if !core.state().is_connected() {
            return Err(core.not_connected());
        }
        let token = chrono::Utc::now().timestamp_millis().to_string();
        if let Err(err) = core.send(Message::from(Command::PING(token.clone()))).await {
            core.fail(err.clone());
            return Err(err);
        }
        Ok(token)
    }

    /// Execute actions outside of a dispatch cycle.
    pub async fn execute(&self, actions: ActionMap) -> ClientResult<ExecutionReport> {
        let mut core = self.shared.core.lock().await;
        let result = core.execute(&actions).await;
        if let Err(err) = &result
            && err.is_fatal()
        {
            core.fail(err.clone());
        }
        result
    }

    // ------------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------------

    /// Load a plugin. It only sees events dispatched after this returns.
    pub async fn load_plugin(&self, name: &str, plugin: Box<dyn Plugin>) -> ClientResult<()> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;
        let snapshot = core.session.snapshot();
        core.plugins
            .load(name, plugin, &mut core.dispatcher, &snapshot)
    }

    /// Unload a plugin between dispatch cycles.
    pub async fn unload_plugin(&self, name: &str) -> ClientResult<()> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;
        core.plugins.unload(name, &mut core.dispatcher)
    }

    pub async fn activate_plugin(&self, name: &str) -> ClientResult<bool> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;
        let snapshot = core.session.snapshot();
        core.plugins.activate(name, &mut core.dispatcher, &snapshot)
    }

    pub async fn deactivate_plugin(&self, name: &str) -> ClientResult<bool> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;
        core.plugins.deactivate(name, &mut core.dispatcher)
    }

    pub async fn plugin_is_active(&self, name: &str) -> ClientResult<bool> {
        self.shared.core.lock().await.plugins.is_active(name)
    }

    pub async fn plugin_help(&self, name: &str) -> ClientResult<String> {
        self.shared.core.lock().await.plugins.help(name)
    }

    pub async fn set_plugin_option(&self, name: &str, option: &str) -> ClientResult<()> {
        self.shared.core.lock().await.plugins.set_option(name, option)
    }

    pub async fn plugin_names(&self) -> Vec<String> {
        let core = self.shared.core.lock().await;
        core.plugins.names().into_iter().map(str::to_string).collect()
    }

    pub async fn plugin_health(&self, name: &str) -> Option<PluginHealth> {
        self.shared.core.lock().await.plugins.health(name).cloned()
    }
}
