//! Plugin contract and registration.
//!
//! A plugin is any type implementing [`Plugin`]. It binds callbacks through a
//! [`Registrar`] and keeps whatever private state it needs behind its own
//! handles; the [`PluginHost`] never shares one plugin's state with another.

mod host;

pub use host::{PluginHealth, PluginHost};

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future;

use crate::action::ActionMap;
use crate::dispatch::{Callback, Dispatcher};
use crate::error::PluginError;
use crate::event::{Event, EventKind};
use crate::session::Snapshot;

/// Capability set every plugin implements.
pub trait Plugin: Send {
    /// Plugin-reported activity. An inactive plugin stays loaded but its
    /// callbacks are expected to return nothing.
    fn is_active(&self) -> bool;

    /// Bind callbacks. Called on load and again on every re-activation.
    fn register_events(&mut self, registrar: &mut Registrar<'_>);

    /// Called before bindings are registered, with a read-only view of the
    /// session.
    fn on_load(&mut self, _snapshot: &Snapshot) {}

    fn on_unload(&mut self) {}

    fn help(&self) -> String;

    /// Apply a `key=value` option.
    fn set_option(&mut self, option: &str) -> Result<(), PluginError>;
}

/// Binds one plugin's callbacks into the dispatcher under its name.
pub struct Registrar<'a> {
    owner: &'a str,
    dispatcher: &'a mut Dispatcher,
    bound: usize,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(owner: &'a str, dispatcher: &'a mut Dispatcher) -> Self {
        Self {
            owner,
            dispatcher,
            bound: 0,
        }
    }

    /// Number of bindings made so far.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Bind a synchronous callback.
    pub fn on<F>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(&Event) -> Result<ActionMap, PluginError> + Send + Sync + 'static,
    {
        self.on_callback(
            kind,
            Arc::new(move |event: Event| future::ready(f(&event)).boxed()),
        );
    }

    /// Bind an async callback.
    pub fn on_async<F, Fut>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionMap, PluginError>> + Send + 'static,
    {
        self.on_callback(kind, Arc::new(move |event: Event| f(event).boxed()));
    }

    /// Bind a prebuilt [`Callback`].
    pub fn on_callback(&mut self, kind: EventKind, callback: Callback) {
        self.dispatcher.register(kind, self.owner, callback);
        self.bound += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::session::Person;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sync_and_async_bindings() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        let mut registrar = Registrar::new("echo", &mut dispatcher);
        registrar.on(EventKind::Message, |event| {
            Ok(ActionMap::from(Action::send_message(event.payload())))
        });
        registrar.on_async(EventKind::Message, |event| async move {
            Ok(ActionMap::from(Action::send_private_message(
                event.person().nick.clone(),
                "noted",
            )))
        });
        assert_eq!(registrar.bound(), 2);

        let event = Event::new(
            EventKind::Message,
            Person::new("alice"),
            Some("#x".into()),
            "hi",
        );
        let outcome = dispatcher.dispatch(&event).await;
        let actions: Vec<_> = outcome.actions.into_iter().collect();
        assert_eq!(
            actions,
            [
                Action::send_message("hi"),
                Action::send_private_message("alice", "noted")
            ]
        );
    }
}
