//! Observer registration and lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::connection::AmiClient;
use crate::constants::WILDCARD_EVENT;
use crate::event::{AmiEvent, DispatchControl};

/// Observer handle invoked by the dispatcher.
pub(crate) type EventCallback =
    Arc<dyn Fn(&AmiEvent, &AmiClient) -> DispatchControl + Send + Sync>;

/// Per-connection observer table.
///
/// Keys are event names, or [`WILDCARD_EVENT`] for observers that want every
/// event. Lists are append-only; dispatch clones the relevant lists under the
/// lock and iterates outside it, so registration from another task never
/// observes a torn list and a slow observer never blocks registration.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    callbacks: Mutex<HashMap<String, Vec<EventCallback>>>,
}

impl CallbackRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an observer under the given event name or wildcard.
    pub(crate) fn register(&self, event_name: &str, callback: EventCallback) {
        let mut callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        callbacks
            .entry(event_name.to_string())
            .or_default()
            .push(callback);
    }

    /// Snapshot of the observers for one dispatch: those registered under
    /// the exact event name first, then the wildcard observers, each group
    /// in registration order.
    pub(crate) fn snapshot(&self, event_name: &str) -> Vec<EventCallback> {
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        if let Some(specific) = callbacks.get(event_name) {
            out.extend(specific.iter().cloned());
        }
        if let Some(wildcard) = callbacks.get(WILDCARD_EVENT) {
            out.extend(wildcard.iter().cloned());
        }
        out
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count: usize = callbacks.values().map(|v| v.len()).sum();
        f.debug_struct("CallbackRegistry")
            .field("observers", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> EventCallback {
        Arc::new(|_, _| DispatchControl::Continue)
    }

    #[test]
    fn specific_before_wildcard_in_registration_order() {
        let registry = CallbackRegistry::new();
        let a = noop();
        let b = noop();
        let w = noop();

        registry.register(WILDCARD_EVENT, w.clone());
        registry.register("Hangup", a.clone());
        registry.register("Hangup", b.clone());

        let snapshot = registry.snapshot("Hangup");
        assert_eq!(snapshot.len(), 3);
        assert!(Arc::ptr_eq(&snapshot[0], &a));
        assert!(Arc::ptr_eq(&snapshot[1], &b));
        assert!(Arc::ptr_eq(&snapshot[2], &w));
    }

    #[test]
    fn wildcard_only_matches_everything() {
        let registry = CallbackRegistry::new();
        registry.register(WILDCARD_EVENT, noop());

        assert_eq!(registry.snapshot("Newchannel").len(), 1);
        assert_eq!(registry.snapshot("Hangup").len(), 1);
    }

    #[test]
    fn unrelated_event_gets_no_observers() {
        let registry = CallbackRegistry::new();
        registry.register("Hangup", noop());
        assert!(registry.snapshot("Newchannel").is_empty());
    }
}
