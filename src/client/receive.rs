//! The receive loop: read → classify → dispatch → execute, one line at a time.

use std::io;

use plugbot_proto::{Command, LineReader, Message, ReadOutcome, read_message};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use super::Client;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::session::ConnectionState;
use crate::telemetry::spans;

enum Tick {
    Cancelled,
    Rearm,
    JoinDeadline,
    Heartbeat,
    Read(Result<ReadOutcome, plugbot_proto::ProtocolError>),
}

impl Client {
    /// Drive the session until `quit` (returns `Ok`) or a fatal error
    /// (returns it, state `Failed`).
    ///
    /// Only one loop can own the reader; a second call while one is running
    /// returns `NotConnected`.
    pub async fn run(&self) -> ClientResult<()> {
        let reader = self.shared.reader.lock().await.take();
        let Some(mut reader) = reader else {
            return Err(ClientError::NotConnected {
                state: self.state(),
            });
        };

        let (cancel, span) = {
            let core = self.shared.core.lock().await;
            (
                core.cancel.clone(),
                spans::session(&core.session.server, &core.session.nick),
            )
        };
        self.receive_loop(&mut reader, cancel).instrument(span).await
    }

    async fn receive_loop(
        &self,
        reader: &mut LineReader,
        cancel: CancellationToken,
    ) -> ClientResult<()> {
        let ping_interval = self.shared.config.bot.ping_interval();
        let ping_timeout = self.shared.config.bot.ping_timeout();

        loop {
            let (join_deadline, heartbeat_at) = {
                let core = self.shared.core.lock().await;
                if !matches!(
                    core.state(),
                    ConnectionState::Joined | ConnectionState::Registering | ConnectionState::Leaving
                ) {
                    return Self::loop_result(&core.session);
                }
                let mut next = core.last_activity + ping_interval;
                if core.ping_sent {
                    next += ping_timeout;
                }
                (core.join_deadline, next)
            };

            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => Tick::Cancelled,
                _ = self.shared.wake.notified() => Tick::Rearm,
                _ = async {
                    match join_deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => Tick::JoinDeadline,
                _ = sleep_until(heartbeat_at) => Tick::Heartbeat,
                read = read_message(reader) => Tick::Read(read),
            };

            let mut core = self.shared.core.lock().await;
            match tick {
                Tick::Cancelled => return Self::loop_result(&core.session),
                Tick::Rearm => {}
                Tick::JoinDeadline => {
                    if core.join_timed_out() {
                        let err = ClientError::RegistrationTimeout(core.registration_timeout());
                        core.fail(err.clone());
                        return Err(err);
                    }
                }
                Tick::Heartbeat => {
                    let idle = core.last_activity.elapsed();
                    if idle >= ping_interval + ping_timeout {
                        let err = ClientError::Transport(TransportError::new(
                            io::ErrorKind::TimedOut,
                            format!("no traffic for {}s", idle.as_secs()),
                        ));
                        core.fail(err.clone());
                        return Err(err);
                    }
                    if idle >= ping_interval && !core.ping_sent {
                        let token = chrono::Utc::now().timestamp_millis().to_string();
                        debug!(idle_secs = idle.as_secs(), "connection idle, pinging server");
                        if let Err(err) = core.send(Message::from(Command::PING(token))).await {
                            core.fail(err.clone());
                            return Err(err);
                        }
                        core.ping_sent = true;
                    }
                }
                Tick::Read(read) => {
                    // quit() may have run while this read was in flight.
                    if cancel.is_cancelled() {
                        return Self::loop_result(&core.session);
                    }
                    let msg = match read {
                        Ok(ReadOutcome::Message(msg)) => msg,
                        Ok(ReadOutcome::Malformed(e)) => {
                            warn!(error = %e, "discarding malformed line");
                            core.last_activity = Instant::now();
                            continue;
                        }
                        Ok(ReadOutcome::Closed) => {
                            let err = ClientError::Transport(TransportError::closed());
                            core.fail(err.clone());
                            return Err(err);
                        }
                        Err(e) => {
                            let err = ClientError::from(e);
                            core.fail(err.clone());
                            return Err(err);
                        }
                    };

                    if let Err(err) = core.handle(msg).await {
                        if err.is_fatal() {
                            core.fail(err.clone());
                            return Err(err);
                        }
                        warn!(error = %err, code = err.error_code(), "line handling failed");
                    }
                }
            }
        }
    }

    /// `Ok` unless the session ended in `Failed`.
    fn loop_result(session: &crate::session::Session) -> ClientResult<()> {
        if session.state() == ConnectionState::Failed {
            Err(session
                .last_error()
                .cloned()
                .unwrap_or_else(|| TransportError::closed().into()))
        } else {
            Ok(())
        }
    }
}
