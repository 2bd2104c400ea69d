//! Change notifications for fields and groups.
//!
//! State holders keep a [`Listeners`] list and hand out a [`Dispatch`] from
//! inside their lock; the dispatch is sent after the lock is released so a
//! listener may call back into the holder.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::result::Flags;

/// A discrete state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityEvent {
    /// A settled validation reported valid after not reporting valid.
    Valid,
    /// A settled validation reported invalid after not reporting invalid.
    Invalid,
    /// Became touched.
    Touched,
    /// Became dirty.
    Dirty,
    /// `modified` flipped to the carried value.
    Modified(bool),
    /// Returned to the created state.
    Reset,
    /// Any observable state changed: result, progress or flags.
    Changed,
    /// Detached; holders registered in a group are removed from it.
    Destroyed,
}

/// Callback invoked for each event.
pub type Listener = Arc<dyn Fn(&ValidityEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__subscription_{}", self.0)
    }
}

/// Subscribed listeners of one state holder.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener, returning whether it was subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Remove every listener.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepare events for delivery outside the lock.
    pub fn dispatch(&self, events: Vec<ValidityEvent>) -> Dispatch {
        let listeners = if events.is_empty() {
            Vec::new()
        } else {
            self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        Dispatch { listeners, events }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Events captured under a lock, waiting to be delivered.
#[must_use = "a dispatch does nothing until sent"]
#[derive(Default)]
pub struct Dispatch {
    listeners: Vec<Listener>,
    events: Vec<ValidityEvent>,
}

impl Dispatch {
    pub fn events(&self) -> &[ValidityEvent] {
        &self.events
    }

    /// Deliver every event to every listener, in order.
    pub fn send(self) {
        for event in &self.events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }
}

/// Events for interaction flags that changed between two snapshots.
pub fn interaction_events(before: Flags, after: Flags) -> Vec<ValidityEvent> {
    let mut events = Vec::new();
    if !before.dirty && after.dirty {
        events.push(ValidityEvent::Dirty);
    }
    if !before.touched && after.touched {
        events.push(ValidityEvent::Touched);
    }
    if before.modified != after.modified {
        events.push(ValidityEvent::Modified(after.modified));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_delivers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        let sink = Arc::clone(&seen);
        listeners.subscribe(Arc::new(move |event| sink.lock().unwrap().push(*event)));

        listeners
            .dispatch(vec![ValidityEvent::Dirty, ValidityEvent::Changed])
            .send();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ValidityEvent::Dirty, ValidityEvent::Changed]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut listeners = Listeners::new();
        let id = listeners.subscribe(Arc::new(|_| {}));
        assert_eq!(listeners.len(), 1);
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_interaction_events() {
        let before = Flags::default();
        let after = Flags {
            dirty: true,
            modified: true,
            ..before
        };
        assert_eq!(
            interaction_events(before, after),
            vec![ValidityEvent::Dirty, ValidityEvent::Modified(true)]
        );

        let back = Flags {
            modified: false,
            ..after
        };
        assert_eq!(interaction_events(after, back), vec![ValidityEvent::Modified(false)]);
    }
}
