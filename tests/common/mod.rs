//! Shared integration test infrastructure.
//!
//! The bot talks to a scripted server over `tokio::io::duplex`: every
//! `connect()` through a [`DuplexConnector`] hands the far end of a fresh
//! pipe to the test as a [`TestServer`].

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use plugbot::{
    ActionMap, Client, Config, Connector, Event, EventKind, Plugin, PluginError, Registrar,
};
use plugbot_proto::{Command, Message, Transport};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf,
    ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const NICK: &str = "plugbot";
pub const CHANNEL: &str = "#x";

/// Config with timeouts short enough for tests.
pub fn config() -> Config {
    config_with("")
}

/// [`config`] plus extra TOML appended at the end.
pub fn config_with(extra: &str) -> Config {
    let text = format!(
        r##"
[server]
host = "irc.test"
port = 6667

[identity]
nick = "{NICK}"
realname = "Plug Bot"

[bot]
channel = "{CHANNEL}"
registration_timeout_secs = 1
callback_timeout_ms = 200
max_consecutive_failures = 3

{extra}
"##
    );
    Config::parse(&text).expect("test config parses")
}

// ============================================================================
// Connectors
// ============================================================================

/// Hands out in-memory streams and passes the server ends to the test.
pub struct DuplexConnector {
    servers: mpsc::UnboundedSender<TestServer>,
    connects: AtomicUsize,
    /// Writes the bot may still make; `usize::MAX` means unlimited.
    write_budget: Arc<AtomicUsize>,
}

impl DuplexConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TestServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            servers: tx,
            connects: AtomicUsize::new(0),
            write_budget: Arc::new(AtomicUsize::new(usize::MAX)),
        });
        (connector, rx)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Let the bot write `lines` more lines, then fail every write with
    /// `BrokenPipe`.
    pub fn cut_writes_after(&self, lines: usize) {
        self.write_budget.store(lines, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Transport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(16 * 1024);
        self.servers
            .send(TestServer::new(server))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "test gone"))?;
        Ok(Transport::new(Box::new(Metered {
            inner: client,
            budget: Arc::clone(&self.write_budget),
        })))
    }
}

/// Bot end of a pipe. Each successful write spends one unit of budget.
struct Metered {
    inner: DuplexStream,
    budget: Arc<AtomicUsize>,
}

impl AsyncRead for Metered {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Metered {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write budget exhausted",
            )));
        }
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if left != usize::MAX && matches!(poll, Poll::Ready(Ok(_))) {
            self.budget.fetch_sub(1, Ordering::SeqCst);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Always refuses.
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Transport> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
    }
}

// ============================================================================
// Scripted server
// ============================================================================

/// The server end of one connection.
pub struct TestServer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    syncs: usize,
}

impl TestServer {
    fn new(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read),
            writer: write,
            syncs: 0,
        }
    }

    /// Send a raw line; CR LF is appended.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive the next line from the bot.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        anyhow::ensure!(n > 0, "bot closed the connection");
        line.trim_end()
            .parse::<Message>()
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))
    }

    /// Receive lines until one satisfies `predicate`; returns all of them.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                return Ok(messages);
            }
        }
    }

    /// Receive one line and return it serialized.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        Ok(self.recv().await?.to_string())
    }

    /// Assert nothing arrives for a short while.
    pub async fn expect_silence(&mut self) -> anyhow::Result<()> {
        match self.recv_timeout(Duration::from_millis(100)).await {
            Ok(msg) => anyhow::bail!("unexpected line: {msg}"),
            Err(_) => Ok(()),
        }
    }

    /// Wait until the bot has processed everything sent so far. The receive
    /// loop handles lines in order, so its PONG for a fresh token is the
    /// barrier. Lines written before the PONG are returned.
    pub async fn sync(&mut self) -> anyhow::Result<Vec<Message>> {
        self.syncs += 1;
        let token = format!("sync-{}", self.syncs);
        self.send_raw(&format!("PING :{token}")).await?;
        let mut lines = self
            .recv_until(|m| m.command == Command::PONG(token.clone()))
            .await?;
        lines.pop();
        Ok(lines)
    }

    /// Consume the handshake, welcome the bot and echo its JOIN. NAMES
    /// follows the echo, as real servers send it.
    pub async fn accept_registration(&mut self, names: &str) -> anyhow::Result<Vec<Message>> {
        let handshake = self
            .recv_until(|m| matches!(m.command, Command::JOIN(..)))
            .await?;
        self.send_raw(&format!(":irc.test 001 {NICK} :Welcome to the test network"))
            .await?;
        self.send_raw(&format!(":{NICK}!bot@bot.host JOIN {CHANNEL}"))
            .await?;
        self.send_raw(&format!(":irc.test 353 {NICK} = {CHANNEL} :{NICK} {names}"))
            .await?;
        self.send_raw(&format!(":irc.test 366 {NICK} {CHANNEL} :End of /NAMES list."))
            .await?;
        Ok(handshake)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub client: Client,
    pub server: TestServer,
    pub servers: mpsc::UnboundedReceiver<TestServer>,
    pub connector: Arc<DuplexConnector>,
    pub handshake: Vec<Message>,
}

impl Harness {
    /// Connect a bot with `plugins` loaded, registered into [`CHANNEL`] with
    /// `names` (NAMES syntax) present.
    pub async fn start(
        config: Config,
        plugins: Vec<(&str, Box<dyn Plugin>)>,
        names: &str,
    ) -> anyhow::Result<Self> {
        let (connector, mut servers) = DuplexConnector::new();
        let client = Client::with_connector(config, connector.clone())?;
        for (name, plugin) in plugins {
            client.load_plugin(name, plugin).await?;
        }

        let connecting = {
            let client = client.clone();
            tokio::spawn(async move { client.connect().await })
        };
        let mut server = servers.recv().await.context("bot never connected")?;
        let handshake = server.accept_registration(names).await?;
        connecting.await??;

        Ok(Self {
            client,
            server,
            servers,
            connector,
            handshake,
        })
    }

    /// Start the receive loop in the background.
    pub fn spawn_run(&self) -> tokio::task::JoinHandle<plugbot::ClientResult<()>> {
        let client = self.client.clone();
        tokio::spawn(async move { client.run().await })
    }
}

// ============================================================================
// Plugins
// ============================================================================

type Reply = Arc<dyn Fn(&Event) -> Result<ActionMap, PluginError> + Send + Sync>;

/// Plugin answering one event kind with a closure and recording what it saw.
pub struct ScriptedPlugin {
    kinds: Vec<EventKind>,
    reply: Reply,
    seen: Arc<Mutex<Vec<Event>>>,
}

impl ScriptedPlugin {
    pub fn new<F>(kind: EventKind, reply: F) -> Self
    where
        F: Fn(&Event) -> Result<ActionMap, PluginError> + Send + Sync + 'static,
    {
        Self {
            kinds: vec![kind],
            reply: Arc::new(reply),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribes to every event kind and never answers.
    pub fn recorder() -> Self {
        Self {
            kinds: EventKind::ALL.to_vec(),
            reply: Arc::new(|_| Ok(ActionMap::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the recorded events, usable after the plugin is boxed.
    pub fn seen(&self) -> Arc<Mutex<Vec<Event>>> {
        Arc::clone(&self.seen)
    }

    pub fn boxed(self) -> Box<dyn Plugin> {
        Box::new(self)
    }
}

impl Plugin for ScriptedPlugin {
    fn is_active(&self) -> bool {
        true
    }

    fn register_events(&mut self, registrar: &mut Registrar<'_>) {
        for kind in &self.kinds {
            let reply = Arc::clone(&self.reply);
            let seen = Arc::clone(&self.seen);
            registrar.on(*kind, move |event| {
                seen.lock().push(event.clone());
                reply(event)
            });
        }
    }

    fn help(&self) -> String {
        "scripted test plugin".into()
    }

    fn set_option(&mut self, option: &str) -> Result<(), PluginError> {
        Err(PluginError::InvalidOption(option.to_string()))
    }
}
