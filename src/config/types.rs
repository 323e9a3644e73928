//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where to connect.
    pub server: ServerConfig,
    /// Who we are on the network.
    pub identity: IdentityConfig,
    /// Channel and timing behaviour.
    pub bot: BotConfig,
    /// Reconnect supervisor policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Built-in plugin settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Server address configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connection password sent as `PASS` (optional).
    pub password: Option<String>,
}

impl ServerConfig {
    /// `host:port`, for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Nickname, also used as the username.
    pub nick: String,
    /// Real name shown in WHOIS.
    #[serde(default = "default_realname")]
    pub realname: String,
}

/// Channel and timing configuration.
///
/// The heartbeat follows a two-phase model:
/// - `ping_interval_secs`: seconds of inbound silence before we send PING (default: 90)
/// - `ping_timeout_secs`: further seconds of silence before the link is declared dead (default: 120)
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Channel joined on connect.
    pub channel: String,
    /// Seconds allowed for registration and for each join confirmation (default: 30).
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
    /// Upper bound for one plugin callback (default: 2000ms).
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,
    /// Consecutive callback failures before a plugin is deactivated; 0 never deactivates.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl BotConfig {
    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

/// Reconnect supervisor policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Attempts per outage; 0 retries forever.
    #[serde(default)]
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number.
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
    #[serde(default = "default_reconnect_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 0,
            delay_secs: default_reconnect_delay(),
            max_delay_secs: default_reconnect_max_delay(),
        }
    }
}

impl ReconnectConfig {
    /// Linear backoff, capped at `max_delay_secs`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = self
            .delay_secs
            .saturating_mul(u64::from(attempt))
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

/// Built-in plugin settings. A missing table leaves the plugin unloaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    pub greeter: Option<GreeterConfig>,
    pub wordfilter: Option<WordFilterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GreeterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Greeting template; `{nick}` is replaced with the joining nick.
    #[serde(default = "default_greeting")]
    pub message: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message: default_greeting(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub words: Vec<String>,
    /// Also ban offenders after kicking them.
    #[serde(default)]
    pub ban: bool,
    #[serde(default = "default_filter_reason")]
    pub reason: String,
}

impl Default for WordFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            words: Vec::new(),
            ban: false,
            reason: default_filter_reason(),
        }
    }
}
