//! Telemetry utilities for dispatch timing and span construction.

use std::time::{Duration, Instant};

use crate::event::EventKind;

/// Guard for timing one dispatch cycle.
///
/// Logs the elapsed time at `debug` when dropped, or at `warn` when the
/// cycle ran past `slow_after`.
pub struct DispatchTimer {
    kind: EventKind,
    start: Instant,
    slow_after: Duration,
}

impl DispatchTimer {
    /// Start timing a dispatch.
    pub fn new(kind: EventKind, slow_after: Duration) -> Self {
        Self {
            kind,
            start: Instant::now(),
            slow_after,
        }
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let micros = elapsed.as_micros() as u64;
        if elapsed > self.slow_after {
            tracing::warn!(kind = %self.kind, micros, "slow dispatch cycle");
        } else {
            tracing::debug!(kind = %self.kind, micros, "dispatch cycle complete");
        }
    }
}

/// Standardized span constructors for client observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one server session.
    pub fn session(server: &str, nick: &str) -> Span {
        info_span!("session", server = %server, nick = %nick)
    }

    /// Create a span for dispatching one event.
    pub fn dispatch(kind: &str, source: &str, channel: Option<&str>) -> Span {
        if let Some(channel) = channel {
            info_span!("dispatch", kind = %kind, source = %source, channel = %channel)
        } else {
            info_span!("dispatch", kind = %kind, source = %source)
        }
    }

    /// Create a span for one plugin callback.
    pub fn callback(plugin: &str) -> Span {
        info_span!("callback", plugin = %plugin)
    }
}
