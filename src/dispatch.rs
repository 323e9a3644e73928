//! Event dispatcher: event kind → ordered subscriber list.
//!
//! One instance per client. Subscribers run one after another in
//! registration order, each under a timeout, and a failing subscriber only
//! costs its own contribution.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{Instrument, warn};

use crate::action::ActionMap;
use crate::error::PluginError;
use crate::event::{Event, EventKind};
use crate::telemetry::spans;

/// A subscriber. Receives its own copy of the event and returns the actions
/// it wants taken.
pub type Callback =
    Arc<dyn Fn(Event) -> BoxFuture<'static, Result<ActionMap, PluginError>> + Send + Sync>;

struct Binding {
    owner: String,
    callback: Callback,
}

/// A subscriber that failed during one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub plugin: String,
    pub error: PluginError,
}

/// Result of one dispatch cycle.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Merged actions, in invocation order within each kind.
    pub actions: ActionMap,
    pub failures: Vec<CallbackFailure>,
    /// Owners of every callback that returned normally.
    pub succeeded: Vec<String>,
}

pub struct Dispatcher {
    bindings: HashMap<EventKind, Vec<Binding>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            bindings: HashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Append a subscriber for `kind`.
    pub fn register(&mut self, kind: EventKind, owner: &str, callback: Callback) {
        self.bindings.entry(kind).or_default().push(Binding {
            owner: owner.to_string(),
            callback,
        });
    }

    /// Drop every binding owned by `owner`. Returns how many were removed.
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        for list in self.bindings.values_mut() {
            let before = list.len();
            list.retain(|b| b.owner != owner);
            removed += before - list.len();
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.bindings.get(&kind).map_or(0, Vec::len)
    }

    /// Owners subscribed to `kind`, in invocation order.
    pub fn subscribers(&self, kind: EventKind) -> Vec<&str> {
        self.bindings
            .get(&kind)
            .map(|list| list.iter().map(|b| b.owner.as_str()).collect())
            .unwrap_or_default()
    }

    /// Run every subscriber for `event.kind()` in order and merge their output.
    pub async fn dispatch(&self, event: &Event) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(list) = self.bindings.get(&event.kind()) else {
            return outcome;
        };

        for binding in list {
            let result = self
                .invoke(binding, event.clone())
                .instrument(spans::callback(&binding.owner))
                .await;
            match result {
                Ok(actions) => {
                    outcome.actions.merge(actions);
                    outcome.succeeded.push(binding.owner.clone());
                }
                Err(error) => {
                    warn!(plugin = %binding.owner, kind = %event.kind(), error = %error, "callback failed");
                    outcome.failures.push(CallbackFailure {
                        plugin: binding.owner.clone(),
                        error,
                    });
                }
            }
        }
        outcome
    }

    async fn invoke(&self, binding: &Binding, event: Event) -> Result<ActionMap, PluginError> {
        // Building the future runs plugin code too, so it gets the same guard.
        let future = std::panic::catch_unwind(AssertUnwindSafe(|| (binding.callback)(event)))
            .map_err(|payload| PluginError::Panicked(panic_message(payload.as_ref())))?;

        match tokio::time::timeout(self.timeout, AssertUnwindSafe(future).catch_unwind()).await {
            Err(_) => Err(PluginError::TimedOut(self.timeout)),
            Ok(Err(payload)) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
            Ok(Ok(result)) => result,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind};
    use crate::session::Person;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(text: &str) -> Event {
        Event::new(EventKind::Message, Person::new("alice"), Some("#x".into()), text)
    }

    fn replying(body: &'static str) -> Callback {
        Arc::new(move |_event| async move { Ok(ActionMap::from(Action::send_message(body))) }.boxed())
    }

    fn failing() -> Callback {
        Arc::new(|_event| async { Err(PluginError::failed("boom")) }.boxed())
    }

    #[tokio::test]
    async fn test_registration_order_is_invocation_order() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        dispatcher.register(EventKind::Message, "first", replying("1"));
        dispatcher.register(EventKind::Message, "second", replying("2"));
        dispatcher.register(EventKind::Message, "third", replying("3"));

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert_eq!(
            outcome.actions.get(ActionKind::SendMessage),
            &[
                Action::send_message("1"),
                Action::send_message("2"),
                Action::send_message("3")
            ]
        );
        assert_eq!(outcome.succeeded, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_others() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        dispatcher.register(EventKind::Message, "good", replying("a"));
        dispatcher.register(EventKind::Message, "bad", failing());
        dispatcher.register(EventKind::Message, "late", replying("b"));

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert_eq!(outcome.actions.len(), 2);
        assert_eq!(
            outcome.failures,
            vec![CallbackFailure {
                plugin: "bad".into(),
                error: PluginError::failed("boom")
            }]
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        dispatcher.register(
            EventKind::Message,
            "panicky",
            Arc::new(|event: Event| {
                async move {
                    if event.payload() == "hi" {
                        panic!("kaboom");
                    }
                    Ok(ActionMap::new())
                }
                .boxed()
            }),
        );
        dispatcher.register(EventKind::Message, "after", replying("still here"));

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.succeeded, ["after"]);
        assert!(matches!(
            &outcome.failures[0].error,
            PluginError::Panicked(msg) if msg == "kaboom"
        ));
    }

    #[tokio::test]
    async fn test_panic_before_future_is_contained() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        dispatcher.register(
            EventKind::Message,
            "eager",
            Arc::new(|event: Event| {
                let n: usize = event.payload().len();
                if n > 0 {
                    panic!("eager {}", n);
                }
                async { Ok(ActionMap::new()) }.boxed()
            }),
        );

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert!(matches!(
            &outcome.failures[0].error,
            PluginError::Panicked(msg) if msg == "eager 2"
        ));
    }

    #[tokio::test]
    async fn test_slow_callback_times_out() {
        let mut dispatcher = Dispatcher::new(Duration::from_millis(50));
        dispatcher.register(
            EventKind::Message,
            "sleepy",
            Arc::new(|_event| {
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(ActionMap::from(Action::send_message("too late")))
                }
                .boxed()
            }),
        );

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert!(outcome.actions.is_empty());
        assert_eq!(
            outcome.failures[0].error,
            PluginError::TimedOut(Duration::from_millis(50))
        );
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_same_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        for owner in ["a", "b"] {
            let seen = Arc::clone(&seen);
            dispatcher.register(
                EventKind::Message,
                owner,
                Arc::new(move |event: Event| {
                    let seen = Arc::clone(&seen);
                    async move {
                        assert_eq!(event.payload(), "same");
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(ActionMap::new())
                    }
                    .boxed()
                }),
            );
        }

        dispatcher.dispatch(&message("same")).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_owner() {
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
        dispatcher.register(EventKind::Message, "gone", replying("x"));
        dispatcher.register(EventKind::Join, "gone", replying("x"));
        dispatcher.register(EventKind::Message, "kept", replying("y"));

        assert_eq!(dispatcher.remove_owner("gone"), 2);
        assert_eq!(dispatcher.subscribers(EventKind::Message), ["kept"]);
        assert_eq!(dispatcher.subscriber_count(EventKind::Join), 0);

        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert_eq!(outcome.actions.iter().count(), 1);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let dispatcher = Dispatcher::new(Duration::from_secs(1));
        let outcome = dispatcher.dispatch(&message("hi")).await;
        assert!(outcome.actions.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
