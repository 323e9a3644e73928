//! Reconnect supervision around [`Client::run`].

use tracing::{error, info, warn};

use super::Client;
use crate::error::ClientResult;
use crate::session::ConnectionState;

impl Client {
    /// Run until `quit`, reconnecting after fatal errors when the
    /// `[reconnect]` section allows it.
    pub async fn run_forever(&self) -> ClientResult<()> {
        let policy = self.shared.config.reconnect.clone();
        let mut attempt: u32 = 0;

        loop {
            let mut last = match self.run().await {
                Ok(()) => return Ok(()),
                Err(e) if !policy.enabled || self.state() != ConnectionState::Failed => {
                    return Err(e);
                }
                Err(e) => e,
            };

            loop {
                attempt += 1;
                if policy.max_attempts > 0 && attempt > policy.max_attempts {
                    error!(attempts = policy.max_attempts, error = %last, "giving up reconnecting");
                    return Err(last);
                }
                if !self.begin_reconnect().await {
                    // Someone called quit while we were down.
                    return Ok(());
                }

                let delay = policy.backoff(attempt);
                warn!(attempt, delay_secs = delay.as_secs(), error = %last, "reconnecting");
                let mut state = self.subscribe_state();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = state.wait_for(|s| *s == ConnectionState::Disconnected) => return Ok(()),
                }

                match self.connect().await {
                    Ok(()) => {
                        info!(attempt, "reconnected");
                        attempt = 0;
                        break;
                    }
                    Err(e) if self.state() == ConnectionState::Failed => last = e,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// `Failed` → `Reconnecting`. False when the session is no longer failed.
    async fn begin_reconnect(&self) -> bool {
        let mut core = self.shared.core.lock().await;
        if core.state() != ConnectionState::Failed {
            return false;
        }
        core.session.set_state(ConnectionState::Reconnecting);
        true
    }
}
