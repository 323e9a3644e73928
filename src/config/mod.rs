//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ServerConfig, BotConfig, ...)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation returning every violation at once

mod defaults;
mod types;
mod validation;

pub use types::{
    BotConfig, Config, ConfigError, GreeterConfig, IdentityConfig, PluginsConfig,
    ReconnectConfig, ServerConfig, WordFilterConfig,
};
pub use validation::{ValidationError, validate};
