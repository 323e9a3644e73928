//! Kicks (and optionally bans) people who use filtered words.

use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use crate::action::{Action, ActionMap};
use crate::config::WordFilterConfig;
use crate::error::PluginError;
use crate::event::EventKind;
use crate::plugin::{Plugin, Registrar};
use crate::session::Privilege;

pub const NAME: &str = "wordfilter";

#[derive(Debug)]
struct State {
    enabled: bool,
    words: Vec<String>,
    /// `None` while the word list is empty.
    pattern: Option<Regex>,
    ban: bool,
    reason: String,
}

impl State {
    fn rebuild(&mut self) -> Result<(), PluginError> {
        if self.words.is_empty() {
            self.pattern = None;
            return Ok(());
        }
        let alternatives: Vec<String> = self.words.iter().map(|w| alternative(w)).collect();
        let source = format!("(?i)(?:{})", alternatives.join("|"));
        let pattern = Regex::new(&source).map_err(|e| PluginError::failed(e.to_string()))?;
        self.pattern = Some(pattern);
        Ok(())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped word with `\b` only on edges that are word characters. A boundary
/// next to `+` or `:` would demand a letter on the other side.
fn alternative(word: &str) -> String {
    let mut out = String::new();
    if word.chars().next().is_some_and(is_word_char) {
        out.push_str(r"\b");
    }
    out.push_str(&regex::escape(word));
    if word.chars().next_back().is_some_and(is_word_char) {
        out.push_str(r"\b");
    }
    out
}

pub struct WordFilter {
    state: Arc<Mutex<State>>,
}

impl WordFilter {
    pub fn new<I, S>(words: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = State {
            enabled: true,
            words: Vec::new(),
            pattern: None,
            ban: false,
            reason: reason.into(),
        };
        for word in words {
            let word: String = word.into();
            let word = word.trim();
            if !word.is_empty() && !state.words.iter().any(|w| w.eq_ignore_ascii_case(word)) {
                state.words.push(word.to_string());
            }
        }
        if let Err(e) = state.rebuild() {
            tracing::warn!(error = %e, "word filter pattern rejected, filtering disabled");
            state.pattern = None;
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn from_config(config: &WordFilterConfig) -> Self {
        let filter = Self::new(config.words.iter().cloned(), config.reason.clone());
        {
            let mut state = filter.state.lock();
            state.enabled = config.enabled;
            state.ban = config.ban;
        }
        filter
    }

    pub fn words(&self) -> Vec<String> {
        self.state.lock().words.clone()
    }
}

impl Plugin for WordFilter {
    fn is_active(&self) -> bool {
        self.state.lock().enabled
    }

    fn register_events(&mut self, registrar: &mut Registrar<'_>) {
        let state = Arc::clone(&self.state);
        registrar.on(EventKind::Message, move |event| {
            let state = state.lock();
            let person = event.person();
            if !state.enabled || person.privilege >= Privilege::Operator {
                return Ok(ActionMap::new());
            }
            let Some(pattern) = &state.pattern else {
                return Ok(ActionMap::new());
            };
            if !pattern.is_match(event.payload()) {
                return Ok(ActionMap::new());
            }

            debug!(nick = %person.nick, "filtered word matched");
            let mut actions =
                ActionMap::from(Action::kick(person.nick.clone(), Some(state.reason.clone())));
            if state.ban {
                actions.push(Action::ban(person.nick.clone()));
            }
            Ok(actions)
        });
    }

    fn help(&self) -> String {
        let state = self.state.lock();
        format!(
            "Kicks{} anyone saying one of {} filtered words. Options: add=<word>, remove=<word>, ban=<bool>.",
            if state.ban { " and bans" } else { "" },
            state.words.len()
        )
    }

    fn set_option(&mut self, option: &str) -> Result<(), PluginError> {
        let invalid = || PluginError::InvalidOption(option.to_string());
        let (key, value) = option.split_once('=').ok_or_else(invalid)?;
        let value = value.trim();
        let mut state = self.state.lock();
        match key.trim() {
            "add" if !value.is_empty() => {
                if !state.words.iter().any(|w| w.eq_ignore_ascii_case(value)) {
                    state.words.push(value.to_string());
                }
                state.rebuild()
            }
            "remove" if !value.is_empty() => {
                let before = state.words.len();
                state.words.retain(|w| !w.eq_ignore_ascii_case(value));
                if state.words.len() == before {
                    return Err(invalid());
                }
                state.rebuild()
            }
            "ban" => {
                state.ban = super::parse_flag(value).ok_or_else(invalid)?;
                Ok(())
            }
            _ => Err(invalid()),
        }
    }
}
