//! Aggregation of several fields (or groups) into one composite state.
//!
//! A group subscribes to every child and recomputes its aggregate flags each
//! time a child notifies, then notifies its own subscribers. Groups implement
//! [`ResultSource`] themselves, so they nest.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use indexmap::IndexMap;
use log::{debug, trace};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::sync::watch;

use crate::field::Validity;
use crate::observer::{Listener, Listeners, SubscriptionId, ValidityEvent, interaction_events};
use crate::result::{Flags, ValidationResult};
use crate::validation::Validation;

/// Anything a group can aggregate.
pub trait ResultSource: Send + Sync {
    /// Current flags.
    fn flags(&self) -> Flags;

    /// Current result snapshot.
    fn snapshot(&self) -> ChildResult;

    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Return to the created state.
    fn reset(&self);

    /// Validate and yield the resulting validity.
    fn validate(&self) -> Validation;
}

impl ResultSource for Validity {
    fn flags(&self) -> Flags {
        Validity::flags(self)
    }

    fn snapshot(&self) -> ChildResult {
        ChildResult::Field(self.result())
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        Validity::subscribe(self, move |event| listener(event))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        Validity::unsubscribe(self, id)
    }

    fn reset(&self) {
        Validity::reset(self)
    }

    fn validate(&self) -> Validation {
        Validity::validate(self)
    }
}

/// Snapshot of one child of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChildResult {
    Field(ValidationResult),
    Group(GroupResult),
}

impl ChildResult {
    pub fn flags(&self) -> Flags {
        match self {
            Self::Field(result) => result.flags(),
            Self::Group(result) => result.flags(),
        }
    }
}

/// Composite result: each child's snapshot plus the aggregate flags.
///
/// Serializes as one object with an entry per child followed by the flags.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    children: IndexMap<String, ChildResult>,
    flags: Flags,
}

impl GroupResult {
    fn new(children: IndexMap<String, ChildResult>) -> Self {
        let flags = aggregate(children.values().map(ChildResult::flags));
        Self { children, flags }
    }

    pub fn get(&self, name: &str) -> Option<&ChildResult> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ChildResult)> {
        self.children.iter().map(|(name, child)| (name.as_str(), child))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn valid(&self) -> bool {
        self.flags.valid
    }

    pub fn invalid(&self) -> bool {
        self.flags.invalid()
    }

    pub fn dirty(&self) -> bool {
        self.flags.dirty
    }

    pub fn pristine(&self) -> bool {
        self.flags.pristine()
    }

    pub fn touched(&self) -> bool {
        self.flags.touched
    }

    pub fn untouched(&self) -> bool {
        self.flags.untouched()
    }

    pub fn modified(&self) -> bool {
        self.flags.modified
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for GroupResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, child) in &self.children {
            map.serialize_entry(name, child)?;
        }
        self.flags.serialize_into(&mut map)?;
        map.end()
    }
}

/// Aggregate flags: valid when every child is, dirty/touched/modified when
/// any child is. No children means valid and pristine.
pub fn aggregate(children: impl IntoIterator<Item = Flags>) -> Flags {
    children.into_iter().fold(Flags::default(), |acc, child| Flags {
        valid: acc.valid && child.valid,
        dirty: acc.dirty || child.dirty,
        touched: acc.touched || child.touched,
        modified: acc.modified || child.modified,
    })
}

struct Child {
    source: Arc<dyn ResultSource>,
    subscription: SubscriptionId,
    generation: u64,
}

struct GroupState {
    children: IndexMap<String, Child>,
    flags: Flags,
    generation: u64,
    /// Recompute passes started and the latest one stored.
    started: u64,
    applied: u64,
    listeners: Listeners,
    watch: watch::Sender<Flags>,
    destroyed: bool,
}

/// A set of named children with aggregate flags.
///
/// Cheap to clone; clones share the same children.
///
/// ```ignore
/// let group = ValidityGroup::new();
/// group.register("email", email.clone());
/// group.register("password", password.clone());
///
/// let valid = group.validate().await;
/// ```
#[derive(Clone)]
pub struct ValidityGroup {
    inner: Arc<Mutex<GroupState>>,
}

impl Default for ValidityGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidityGroup {
    pub fn new() -> Self {
        let (watch, _) = watch::channel(Flags::default());
        Self {
            inner: Arc::new(Mutex::new(GroupState {
                children: IndexMap::new(),
                flags: Flags::default(),
                generation: 0,
                started: 0,
                applied: 0,
                listeners: Listeners::new(),
                watch,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a child under `name`, replacing any child already there.
    pub fn register<S>(&self, name: impl Into<String>, source: S)
    where
        S: ResultSource + 'static,
    {
        self.register_shared(name, Arc::new(source));
    }

    /// Register an already shared child.
    pub fn register_shared(&self, name: impl Into<String>, source: Arc<dyn ResultSource>) {
        let name = name.into();
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.generation
        };

        let subscription = source.subscribe(child_listener(
            Arc::downgrade(&self.inner),
            name.clone(),
            generation,
        ));

        let replaced = self.lock().children.insert(
            name.clone(),
            Child {
                source,
                subscription,
                generation,
            },
        );
        if let Some(old) = replaced {
            old.source.unsubscribe(old.subscription);
            debug!("Replaced group child '{}'", name);
        } else {
            debug!("Registered group child '{}'", name);
        }

        self.recompute();
    }

    /// Remove a child and its subscription. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.lock().children.shift_remove(name);
        let Some(child) = removed else {
            return false;
        };
        child.source.unsubscribe(child.subscription);
        debug!("Unregistered group child '{}'", name);

        self.recompute();
        true
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().children.contains_key(name)
    }

    /// Names of the registered children in registration order.
    pub fn validity_keys(&self) -> Vec<String> {
        self.lock().children.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().children.is_empty()
    }

    /// Reset every child except `ignore`.
    pub fn reset_results(&self, ignore: Option<&str>) {
        let targets: Vec<Arc<dyn ResultSource>> = self
            .lock()
            .children
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != ignore)
            .map(|(_, child)| Arc::clone(&child.source))
            .collect();

        for source in &targets {
            source.reset();
        }
        self.recompute();

        let dispatch = self.lock().listeners.dispatch(vec![ValidityEvent::Reset]);
        dispatch.send();
    }

    /// Validate every child; valid when all of them are.
    pub fn validate(&self) -> Validation {
        let sources = self.sources();
        Validation::all(sources.iter().map(|source| source.validate()).collect())
    }

    /// Snapshot of every child plus the aggregate flags.
    pub fn result(&self) -> GroupResult {
        let children: Vec<(String, Arc<dyn ResultSource>)> = self
            .lock()
            .children
            .iter()
            .map(|(name, child)| (name.clone(), Arc::clone(&child.source)))
            .collect();

        GroupResult::new(
            children
                .into_iter()
                .map(|(name, source)| (name, source.snapshot()))
                .collect(),
        )
    }

    /// Aggregate flags as of the last child notification.
    pub fn flags(&self) -> Flags {
        self.lock().flags
    }

    pub fn valid(&self) -> bool {
        self.flags().valid
    }

    pub fn invalid(&self) -> bool {
        self.flags().invalid()
    }

    pub fn dirty(&self) -> bool {
        self.flags().dirty
    }

    pub fn pristine(&self) -> bool {
        self.flags().pristine()
    }

    pub fn touched(&self) -> bool {
        self.flags().touched
    }

    pub fn untouched(&self) -> bool {
        self.flags().untouched()
    }

    pub fn modified(&self) -> bool {
        self.flags().modified
    }

    /// Subscribe to aggregate changes.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ValidityEvent) + Send + Sync + 'static,
    {
        self.lock().listeners.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().listeners.unsubscribe(id)
    }

    /// Receive every new aggregate.
    pub fn watch(&self) -> watch::Receiver<Flags> {
        self.lock().watch.subscribe()
    }

    /// Detach from every child and notify subscribers.
    ///
    /// Children are left alive; only the group's subscriptions go.
    pub fn destroy(&self) {
        let (children, dispatch) = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            let children: Vec<Child> = state.children.drain(..).map(|(_, child)| child).collect();
            let dispatch = state.listeners.dispatch(vec![ValidityEvent::Destroyed]);
            state.listeners.clear();
            (children, dispatch)
        };

        for child in children {
            child.source.unsubscribe(child.subscription);
        }
        debug!("Group destroyed");
        dispatch.send();
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    fn sources(&self) -> Vec<Arc<dyn ResultSource>> {
        self.lock()
            .children
            .values()
            .map(|child| Arc::clone(&child.source))
            .collect()
    }

    fn on_child_event(&self, name: &str, generation: u64, event: &ValidityEvent) {
        match event {
            ValidityEvent::Destroyed => {
                let current = self
                    .lock()
                    .children
                    .get(name)
                    .is_some_and(|child| child.generation == generation);
                if current {
                    self.unregister(name);
                }
            }
            _ => self.recompute(),
        }
    }

    /// Re-aggregate child flags and notify on change.
    ///
    /// Children are read without the group lock, so concurrent passes may
    /// finish out of order; a pass never overwrites one that started later.
    fn recompute(&self) {
        let pass = {
            let mut state = self.lock();
            state.started += 1;
            state.started
        };
        let after = aggregate(self.sources().iter().map(|source| source.flags()));

        let dispatch = {
            let mut state = self.lock();
            if pass < state.applied {
                return;
            }
            state.applied = pass;
            let before = state.flags;
            state.flags = after;
            if before != after {
                trace!("Group flags changed: {:?} -> {:?}", before, after);
                state.watch.send_replace(after);
            }

            let mut events = interaction_events(before, after);
            if before.valid != after.valid {
                events.push(if after.valid {
                    ValidityEvent::Valid
                } else {
                    ValidityEvent::Invalid
                });
            }
            events.push(ValidityEvent::Changed);
            state.listeners.dispatch(events)
        };
        dispatch.send();
    }
}

impl ResultSource for ValidityGroup {
    fn flags(&self) -> Flags {
        ValidityGroup::flags(self)
    }

    fn snapshot(&self) -> ChildResult {
        ChildResult::Group(self.result())
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        self.lock().listeners.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        ValidityGroup::unsubscribe(self, id)
    }

    fn reset(&self) {
        self.reset_results(None)
    }

    fn validate(&self) -> Validation {
        ValidityGroup::validate(self)
    }
}

impl fmt::Debug for ValidityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ValidityGroup")
            .field("children", &state.children.keys().collect::<Vec<_>>())
            .field("flags", &state.flags)
            .finish_non_exhaustive()
    }
}

fn child_listener(group: Weak<Mutex<GroupState>>, name: String, generation: u64) -> Listener {
    Arc::new(move |event| {
        if let Some(inner) = group.upgrade() {
            ValidityGroup { inner }.on_child_event(&name, generation, event);
        }
    })
}
