//! Event handlers.
//!
//! [`Handler`] is the dispatch seam the session calls for every event.
//! [`HandlerRegistry`] fans one event out to many callbacks; any closure
//! taking a [`SessionEvent`] works as a handler too.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::SessionEvent;

/// Receives session events, in order, from the dispatch worker.
///
/// Calls are synchronous. A slow handler delays later events and, once the
/// event queue fills up, the socket read itself.
pub trait Handler: Send + Sync {
    /// Handle one event.
    fn call(&self, event: SessionEvent);
}

impl<F> Handler for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn call(&self, event: SessionEvent) {
        self(event);
    }
}

/// Identifies a registered callback for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Entries {
    next_id: u64,
    callbacks: Vec<(HandlerId, Callback)>,
}

/// Fan-out handler over a list of callbacks.
///
/// Callbacks run in registration order, outside the registry lock, so a
/// callback may add or remove handlers without deadlocking.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Mutex<Entries>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every event.
    pub fn add_handler<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = HandlerId(entries.next_id);
        entries.next_id += 1;
        entries.callbacks.push((id, Arc::new(callback)));
        id
    }

    /// Unregister a callback. Returns whether it was registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.callbacks.len();
        entries.callbacks.retain(|(existing, _)| *existing != id);
        entries.callbacks.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    /// Whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Handler for HandlerRegistry {
    fn call(&self, event: SessionEvent) {
        let snapshot: Vec<Callback> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .callbacks
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };
        for callback in snapshot {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::session::Closed;
    use crate::transport::Event;

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.add_handler(move |_| seen.lock().unwrap().push(tag));
        }
        registry.call(SessionEvent::Frame(Event::Data(b"{}".to_vec())));

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_remove_handler() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = registry.add_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.call(SessionEvent::Closed(Closed { error: None }));
        assert!(registry.remove_handler(id));
        assert!(!registry.remove_handler(id));
        registry.call(SessionEvent::Closed(Closed { error: None }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_callback_may_register_another_handler() {
        let registry = Arc::new(HandlerRegistry::new());
        let inner = Arc::clone(&registry);
        registry.add_handler(move |_| {
            inner.add_handler(|_| {});
        });

        registry.call(SessionEvent::Closed(Closed { error: None }));
        assert_eq!(registry.len(), 2);
    }
}
