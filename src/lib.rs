//! plugbot - a plugin-driven IRC bot.
//!
//! One [`Client`] holds one server connection. Inbound lines are parsed by
//! `plugbot-proto`, sorted into [`Event`]s by [`codec`], fanned out to
//! plugins by the [`dispatch::Dispatcher`], and the [`ActionMap`]s they return
//! are validated and written back by the [`executor`].

pub mod action;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod executor;
pub mod plugin;
pub mod plugins;
pub mod session;
pub mod telemetry;

pub use action::{Action, ActionKind, ActionMap};
pub use client::{Client, Connector, TcpConnector};
pub use config::Config;
pub use error::{ClientError, ClientResult, PluginError, TransportError};
pub use event::{Event, EventKind};
pub use executor::ExecutionReport;
pub use plugin::{Plugin, PluginHealth, PluginHost, Registrar};
pub use session::{ConnectionState, Person, Privilege, Snapshot};
