//! Greets people joining the channel.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::{Action, ActionMap};
use crate::config::GreeterConfig;
use crate::error::PluginError;
use crate::event::EventKind;
use crate::plugin::{Plugin, Registrar};
use crate::session::Snapshot;
use plugbot_proto::irc_eq;

pub const NAME: &str = "greeter";

#[derive(Debug)]
struct State {
    enabled: bool,
    template: String,
    own_nick: String,
    greeted: u64,
}

pub struct Greeter {
    state: Arc<Mutex<State>>,
}

impl Greeter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                enabled: true,
                template: template.into(),
                own_nick: String::new(),
                greeted: 0,
            })),
        }
    }

    pub fn from_config(config: &GreeterConfig) -> Self {
        let greeter = Self::new(config.message.clone());
        greeter.state.lock().enabled = config.enabled;
        greeter
    }

    /// Number of greetings sent since load.
    pub fn greeted(&self) -> u64 {
        self.state.lock().greeted
    }
}

impl Plugin for Greeter {
    fn is_active(&self) -> bool {
        self.state.lock().enabled
    }

    fn register_events(&mut self, registrar: &mut Registrar<'_>) {
        let state = Arc::clone(&self.state);
        registrar.on(EventKind::Join, move |event| {
            let mut state = state.lock();
            let nick = &event.person().nick;
            if !state.enabled || irc_eq(nick, &state.own_nick) {
                return Ok(ActionMap::new());
            }
            state.greeted += 1;
            let text = state.template.replace("{nick}", nick);
            Ok(ActionMap::from(Action::send_message(text)))
        });
    }

    fn on_load(&mut self, snapshot: &Snapshot) {
        self.state.lock().own_nick = snapshot.nick.clone();
    }

    fn help(&self) -> String {
        format!(
            "Greets everyone who joins with \"{}\". Options: message=<text>, enabled=<bool>.",
            self.state.lock().template
        )
    }

    fn set_option(&mut self, option: &str) -> Result<(), PluginError> {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| PluginError::InvalidOption(option.to_string()))?;
        let mut state = self.state.lock();
        match key.trim() {
            "message" if !value.trim().is_empty() => state.template = value.trim().to_string(),
            "enabled" => {
                state.enabled = super::parse_flag(value)
                    .ok_or_else(|| PluginError::InvalidOption(option.to_string()))?;
            }
            _ => return Err(PluginError::InvalidOption(option.to_string())),
        }
        Ok(())
    }
}
