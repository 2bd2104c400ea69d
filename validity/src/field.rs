//! A validated field: interaction tracking plus the validation run state machine.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use log::{debug, trace};
use serde_json::Value;
use tokio::sync::watch;

use crate::classes::ClassNames;
use crate::config::ValidationContext;
use crate::error::ConfigError;
use crate::executor::{self, Execution, ValidationOutcome};
use crate::interaction::InteractionState;
use crate::observer::{Dispatch, Listeners, SubscriptionId, ValidityEvent, interaction_events};
use crate::progress::ProgressMap;
use crate::registry::ValidatorSpec;
use crate::result::{Flags, ValidationResult, build_result};
use crate::rules::ValidatorRef;
use crate::validation::Validation;

/// Monotonic identifier of a validation run on one field.
///
/// Settlements carrying anything but the field's latest id are stale and
/// discarded without a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Accumulator of the run in flight.
#[derive(Debug)]
struct RunState {
    id: RunId,
    outcomes: Vec<ValidationOutcome>,
}

struct FieldState {
    name: String,
    specs: Arc<[ValidatorSpec]>,
    interaction: InteractionState,
    /// Outcomes of the last settled run (all `NotRun` before the first).
    committed: Vec<(String, ValidationOutcome)>,
    run: Option<RunState>,
    latest: RunId,
    progress: ProgressMap,
    valid: bool,
    validated: bool,
    /// Validity last announced through `Valid`/`Invalid`.
    reported: Option<bool>,
    result: ValidationResult,
    classes: ClassNames,
    listeners: Listeners,
    watch: watch::Sender<ValidationResult>,
    destroyed: bool,
}

impl FieldState {
    fn new(name: String, initial: Value, specs: Vec<ValidatorSpec>, classes: ClassNames) -> Self {
        let interaction = InteractionState::new(initial);
        let committed = not_run(&specs);
        let result = build_result(&name, &committed, interaction.flags());
        let (watch, _) = watch::channel(result.clone());

        Self {
            progress: ProgressMap::new(specs.iter().map(|s| s.name.as_str())),
            specs: specs.into(),
            name,
            interaction,
            committed,
            run: None,
            latest: RunId::default(),
            valid: true,
            validated: false,
            reported: None,
            result,
            classes,
            listeners: Listeners::new(),
            watch,
            destroyed: false,
        }
    }

    fn flags(&self) -> Flags {
        Flags::new(self.valid, self.interaction.flags())
    }

    /// Rebuild the cached result after any mutation.
    fn refresh(&mut self) {
        self.result = build_result(&self.name, &self.committed, self.interaction.flags());
        self.valid = self.result.valid();
        self.watch.send_replace(self.result.clone());
    }

    /// Drop the run in flight so its settlements become stale.
    fn supersede(&mut self) {
        self.latest = self.latest.next();
        self.run = None;
        self.progress.reset();
    }

    fn begin_run(&mut self) -> RunId {
        self.latest = self.latest.next();
        self.run = Some(RunState {
            id: self.latest,
            outcomes: vec![ValidationOutcome::Running; self.specs.len()],
        });
        for spec in self.specs.iter() {
            self.progress.set_running(&spec.name);
        }
        self.latest
    }

    /// Record one validator's outcome. Returns `false` for stale settlements.
    fn commit(&mut self, run: RunId, index: usize, outcome: ValidationOutcome) -> bool {
        if run != self.latest {
            return false;
        }
        let Some(state) = self.run.as_mut().filter(|state| state.id == run) else {
            return false;
        };
        let Some(slot) = state.outcomes.get_mut(index) else {
            return false;
        };
        *slot = outcome;
        self.progress.clear(&self.specs[index].name);
        true
    }

    /// Close the run once every validator has committed.
    fn try_settle(&mut self, run: RunId) -> Vec<ValidityEvent> {
        let ready = self
            .run
            .as_ref()
            .is_some_and(|state| state.id == run && state.outcomes.iter().all(|o| o.is_settled()));
        if !ready {
            return Vec::new();
        }
        let Some(state) = self.run.take() else {
            return Vec::new();
        };

        self.committed = self
            .specs
            .iter()
            .map(|spec| spec.name.clone())
            .zip(state.outcomes)
            .collect();
        self.validated = true;
        self.refresh();
        debug!("Field '{}' settled run {}: valid={}", self.name, run, self.valid);

        let mut events = Vec::new();
        if self.reported != Some(self.valid) {
            self.reported = Some(self.valid);
            events.push(validity_event(self.valid));
        }
        events
    }

    /// Announce a validity flip that happened outside a run.
    ///
    /// Nothing is announced for a field that never reported.
    fn report_flip(&mut self) -> Option<ValidityEvent> {
        let reported = self.reported?;
        if reported == self.valid {
            return None;
        }
        self.reported = Some(self.valid);
        Some(validity_event(self.valid))
    }
}

fn validity_event(valid: bool) -> ValidityEvent {
    if valid {
        ValidityEvent::Valid
    } else {
        ValidityEvent::Invalid
    }
}

/// A field under validation.
///
/// `Validity` is a cheap-to-clone handle; clones share the same state. The
/// binding layer feeds it [`value_changed`](Self::value_changed),
/// [`blurred`](Self::blurred) and [`reset`](Self::reset) signals and calls
/// [`validate`](Self::validate) when it wants a verdict.
///
/// # Example
///
/// ```ignore
/// let config = ValidityConfig::new().into_shared();
/// let cx = ValidationContext::new(config);
/// let field = cx.field("field1", "", ValidatorRef::rules().with("required", true))?;
///
/// field.value_changed("hello");
/// assert!(field.validate().await);
/// assert!(field.result().errors().is_none());
/// ```
#[derive(Clone)]
pub struct Validity {
    inner: Arc<Mutex<FieldState>>,
    context: ValidationContext,
}

impl Validity {
    /// Attach a field, resolving its validators immediately.
    pub fn new(
        context: &ValidationContext,
        name: impl Into<String>,
        initial: Value,
        validators: ValidatorRef,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let specs = context.resolve(&validators)?;
        debug!("Attached field '{}' with {} validators", name, specs.len());

        Ok(Self {
            inner: Arc::new(Mutex::new(FieldState::new(
                name,
                initial,
                specs,
                context.class_names(),
            ))),
            context: context.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FieldState> {
        lock(&self.inner)
    }

    /// Record a new value from the binding layer.
    pub fn value_changed(&self, value: impl Into<Value>) {
        let dispatch = {
            let mut state = self.lock();
            let before = state.flags();
            state.interaction.value_changed(value.into());
            state.refresh();
            let mut events = interaction_events(before, state.flags());
            events.push(ValidityEvent::Changed);
            state.listeners.dispatch(events)
        };
        dispatch.send();
    }

    /// Record a blur from the binding layer.
    pub fn blurred(&self) {
        let dispatch = {
            let mut state = self.lock();
            let before = state.flags();
            state.interaction.blurred();
            state.refresh();
            let mut events = interaction_events(before, state.flags());
            if !events.is_empty() {
                events.push(ValidityEvent::Changed);
            }
            state.listeners.dispatch(events)
        };
        dispatch.send();
    }

    /// Replace the baseline value that `modified` compares against.
    pub fn set_initial(&self, initial: impl Into<Value>) {
        let dispatch = {
            let mut state = self.lock();
            let before = state.flags();
            state.interaction.set_initial(initial.into());
            state.refresh();
            let mut events = interaction_events(before, state.flags());
            events.push(ValidityEvent::Changed);
            state.listeners.dispatch(events)
        };
        dispatch.send();
    }

    /// Return to the created state.
    ///
    /// Runs in flight become stale. Calling it twice is the same as once.
    pub fn reset(&self) {
        let dispatch = {
            let mut state = self.lock();
            let before = state.flags();
            state.supersede();
            state.interaction.reset();
            state.committed = not_run(&state.specs);
            state.validated = false;
            state.refresh();
            trace!("Field '{}' reset", state.name);

            let mut events = interaction_events(before, state.flags());
            events.extend(state.report_flip());
            events.push(ValidityEvent::Reset);
            events.push(ValidityEvent::Changed);
            state.listeners.dispatch(events)
        };
        dispatch.send();
    }

    /// Run every validator against the current value.
    ///
    /// A newer call supersedes this one: its settlements are then discarded,
    /// and the returned validation resolves to whatever the field reports
    /// once this call's validators have finished.
    pub fn validate(&self) -> Validation {
        let (run, field, value, specs, started) = {
            let mut state = self.lock();
            let run = state.begin_run();
            debug!("Validating field '{}' (run {})", state.name, run);
            let started = state.listeners.dispatch(vec![ValidityEvent::Changed]);
            (
                run,
                state.name.clone(),
                state.interaction.current().clone(),
                Arc::clone(&state.specs),
                started,
            )
        };
        started.send();

        let mut settled = Vec::new();
        let mut pending = Vec::new();
        for (index, spec) in specs.iter().enumerate() {
            match executor::execute(spec, &field, &value) {
                Execution::Settled(outcome) => settled.push((index, outcome)),
                Execution::Pending(fut) => pending.push((index, fut)),
            }
        }

        let dispatch = {
            let mut state = self.lock();
            let mut committed = false;
            for (index, outcome) in settled {
                committed |= state.commit(run, index, outcome);
            }
            let mut events = state.try_settle(run);
            if committed || !events.is_empty() {
                events.push(ValidityEvent::Changed);
            }
            state.listeners.dispatch(events)
        };
        dispatch.send();

        if pending.is_empty() {
            return Validation::Settled(self.valid());
        }

        let inner = Arc::clone(&self.inner);
        Validation::Pending(Box::pin(async move {
            join_all(pending.into_iter().map(|(index, fut)| {
                let inner = Arc::clone(&inner);
                async move {
                    let outcome = fut.await;
                    settle(&inner, run, index, outcome).send();
                }
            }))
            .await;
            lock(&inner).valid
        }))
    }

    /// Replace the validator set.
    ///
    /// The new set is resolved first; on error the field is left untouched.
    /// Runs in flight become stale and the field returns to not-validated.
    pub fn set_validators(&self, validators: impl Into<ValidatorRef>) -> Result<(), ConfigError> {
        let specs = self.context.resolve(&validators.into())?;
        let dispatch = {
            let mut state = self.lock();
            state.supersede();
            state.progress = ProgressMap::new(specs.iter().map(|s| s.name.as_str()));
            state.committed = not_run(&specs);
            state.specs = specs.into();
            state.validated = false;
            state.refresh();
            debug!("Field '{}' reconfigured with {} validators", state.name, state.specs.len());

            let mut events: Vec<ValidityEvent> = state.report_flip().into_iter().collect();
            events.push(ValidityEvent::Changed);
            state.listeners.dispatch(events)
        };
        dispatch.send();
        Ok(())
    }

    /// Detach the field.
    ///
    /// Listeners receive [`ValidityEvent::Destroyed`] (groups unregister the
    /// field on it) and are then dropped. Runs in flight become stale.
    pub fn destroy(&self) {
        let dispatch = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.supersede();
            debug!("Field '{}' destroyed", state.name);
            let dispatch = state.listeners.dispatch(vec![ValidityEvent::Destroyed]);
            state.listeners.clear();
            dispatch
        };
        dispatch.send();
    }

    /// Subscribe to state changes.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ValidityEvent) + Send + Sync + 'static,
    {
        self.lock().listeners.subscribe(Arc::new(listener))
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().listeners.unsubscribe(id)
    }

    /// Receive every new result snapshot.
    pub fn watch(&self) -> watch::Receiver<ValidationResult> {
        self.lock().watch.subscribe()
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.lock().interaction.current().clone()
    }

    /// Baseline value.
    pub fn initial_value(&self) -> Value {
        self.lock().interaction.initial().clone()
    }

    /// Latest committed result.
    pub fn result(&self) -> ValidationResult {
        self.lock().result.clone()
    }

    /// Progress of each validator.
    pub fn progresses(&self) -> ProgressMap {
        self.lock().progress.clone()
    }

    pub fn flags(&self) -> Flags {
        self.lock().flags()
    }

    pub fn valid(&self) -> bool {
        self.lock().valid
    }

    pub fn invalid(&self) -> bool {
        !self.valid()
    }

    pub fn dirty(&self) -> bool {
        self.lock().interaction.dirty()
    }

    pub fn pristine(&self) -> bool {
        !self.dirty()
    }

    pub fn touched(&self) -> bool {
        self.lock().interaction.touched()
    }

    pub fn untouched(&self) -> bool {
        !self.touched()
    }

    pub fn modified(&self) -> bool {
        self.lock().interaction.modified()
    }

    /// Check if a run is in flight.
    pub fn is_validating(&self) -> bool {
        self.lock().run.is_some()
    }

    /// Check if a run has settled since creation or the last reset.
    pub fn is_validated(&self) -> bool {
        self.lock().validated
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// State class names for the binding layer.
    pub fn classes(&self) -> Vec<String> {
        let state = self.lock();
        state
            .classes
            .for_state(state.flags(), state.validated)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Validator names in declaration order.
    pub fn validator_names(&self) -> Vec<String> {
        self.lock().specs.iter().map(|s| s.name.clone()).collect()
    }
}

impl fmt::Debug for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Validity")
            .field("name", &state.name)
            .field("flags", &state.flags())
            .field("latest", &state.latest)
            .finish_non_exhaustive()
    }
}

fn lock(inner: &Mutex<FieldState>) -> MutexGuard<'_, FieldState> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Commit an async settlement; stale ones produce an empty dispatch.
fn settle(inner: &Mutex<FieldState>, run: RunId, index: usize, outcome: ValidationOutcome) -> Dispatch {
    let mut state = lock(inner);
    if !state.commit(run, index, outcome) {
        return Dispatch::default();
    }
    let mut events = state.try_settle(run);
    events.push(ValidityEvent::Changed);
    state.listeners.dispatch(events)
}

fn not_run(specs: &[ValidatorSpec]) -> Vec<(String, ValidationOutcome)> {
    specs
        .iter()
        .map(|spec| (spec.name.clone(), ValidationOutcome::NotRun))
        .collect()
}
