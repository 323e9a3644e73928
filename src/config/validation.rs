//! Configuration validation.
//!
//! Validates configuration before `connect()` so that bad values fail fast
//! instead of surfacing later as transport or server errors.

use super::Config;
use plugbot_proto::{ChannelExt, NickExt};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must be non-zero")]
    InvalidPort,
    #[error("server.password must not contain spaces or line breaks")]
    InvalidPassword,
    #[error("identity.nick is not a valid nickname: '{0}'")]
    InvalidNick(String),
    #[error("identity.realname must not contain line breaks")]
    InvalidRealname,
    #[error("bot.channel is not a valid channel name: '{0}'")]
    InvalidChannel(String),
    #[error("bot.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("reconnect.max_delay_secs ({max}) is below reconnect.delay_secs ({base})")]
    BackoffInverted { base: u64, max: u64 },
    #[error("plugins.wordfilter.words contains an empty entry")]
    EmptyFilterWord,
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n', '\0'])
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Server
    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if let Some(ref password) = config.server.password
        && (password.is_empty() || password.contains(' ') || has_line_break(password))
    {
        errors.push(ValidationError::InvalidPassword);
    }

    // Identity
    if !config.identity.nick.is_valid_nick() {
        errors.push(ValidationError::InvalidNick(config.identity.nick.clone()));
    }
    if has_line_break(&config.identity.realname) {
        errors.push(ValidationError::InvalidRealname);
    }

    // Bot
    if !config.bot.channel.is_channel_name() {
        errors.push(ValidationError::InvalidChannel(config.bot.channel.clone()));
    }
    if config.bot.registration_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("registration_timeout_secs"));
    }
    if config.bot.ping_interval_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("ping_interval_secs"));
    }
    if config.bot.ping_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("ping_timeout_secs"));
    }
    if config.bot.callback_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("callback_timeout_ms"));
    }

    // Reconnect
    let reconnect = &config.reconnect;
    if reconnect.enabled && reconnect.max_delay_secs < reconnect.delay_secs {
        errors.push(ValidationError::BackoffInverted {
            base: reconnect.delay_secs,
            max: reconnect.max_delay_secs,
        });
    }

    // Plugins
    if let Some(ref filter) = config.plugins.wordfilter
        && filter.words.iter().any(|w| w.trim().is_empty())
    {
        errors.push(ValidationError::EmptyFilterWord);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
