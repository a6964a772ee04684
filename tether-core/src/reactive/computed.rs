//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. The getter runs inside a lazy backing effect. Nothing runs until the
//!    value is first read.
//!
//! 2. Reading a dirty computed runs the getter, caches the result and marks
//!    the computed clean. Reading a clean computed returns the cache.
//!
//! 3. When a dependency changes, the backing effect's scheduler marks the
//!    computed dirty and notifies whoever read it. The getter itself does
//!    not run until the next read.
//!
//! Every read subscribes the running effect to the computed, whether or not
//! it recomputed.
//!
//! # Why This Matters
//!
//! A chain of computed values only does work for the links that are read.
//! A computed that is invalidated many times between two reads still runs
//! its getter once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{Effect, EffectOptions};
use super::refs::{Ref, RefImpl};
use crate::error::{warn, ReactivityError};
use crate::graph::{track, trigger, Change, DepsMap, TargetRef, TrackKey, TrackOp, TriggerOp};
use crate::value::Value;

/// Cache state of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The getter must run before the value can be returned.
    Dirty,

    /// The cached value is up-to-date.
    Clean,
}

type Setter = Box<dyn Fn(Value)>;

struct ComputedInner {
    value: RefCell<Value>,
    state: Cell<ComputedState>,
    effect: Effect,
    setter: Option<Setter>,
    deps: DepsMap,
}

impl ComputedInner {
    fn invalidate(self: Rc<Self>) {
        if self.state.get() == ComputedState::Dirty {
            return;
        }
        self.state.set(ComputedState::Dirty);
        let this = Ref::new(self);
        trigger(
            TargetRef::Ref(&this),
            Change::new(TriggerOp::Set, Some(TrackKey::ref_value())),
        );
    }
}

impl RefImpl for ComputedInner {
    fn get(&self, this: &Ref) -> Value {
        if self.state.get() == ComputedState::Dirty {
            let value = self.effect.run();
            *self.value.borrow_mut() = value;
            self.state.set(ComputedState::Clean);
        }
        track(TargetRef::Ref(this), TrackOp::Get, TrackKey::ref_value());
        self.value.borrow().clone()
    }

    fn set(&self, _this: &Ref, value: Value) {
        match &self.setter {
            Some(setter) => setter(value),
            None => warn(ReactivityError::ReadonlyComputed),
        }
    }

    fn deps(&self) -> &DepsMap {
        &self.deps
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }

    fn label(&self) -> &'static str {
        "Computed"
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = ref_(1);
/// let source = count.clone();
/// let doubled = computed(move || source.get().as_number().unwrap_or(0.0) * 2.0);
///
/// assert_eq!(doubled.get(), 2);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

impl Computed {
    fn build<F, R>(getter: F, setter: Option<Setter>) -> Self
    where
        F: Fn() -> R + 'static,
        R: Into<Value>,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner>| {
            let this = this.clone();
            let options = EffectOptions::new().lazy().scheduler(move |_| {
                if let Some(inner) = this.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                value: RefCell::new(Value::Undefined),
                state: Cell::new(ComputedState::Dirty),
                effect: Effect::new(move || -> Value { getter().into() }, options),
                setter,
                deps: DepsMap::default(),
            }
        });
        Self { inner }
    }

    /// The current value, recomputed first when dirty.
    pub fn get(&self) -> Value {
        self.to_ref().get()
    }

    /// Assign through the setter. A computed without one warns and ignores
    /// the write.
    pub fn set(&self, value: impl Into<Value>) {
        self.to_ref().set(value)
    }

    /// Assign through the setter, or report that there is none.
    pub fn try_set(&self, value: impl Into<Value>) -> Result<(), ReactivityError> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value.into());
                Ok(())
            }
            None => Err(ReactivityError::ReadonlyComputed),
        }
    }

    pub fn state(&self) -> ComputedState {
        self.inner.state.get()
    }

    /// The lazy effect running the getter.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }

    /// Whether the computed has no setter.
    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// The computed as a [`Ref`] sharing its cache and subscribers.
    pub fn to_ref(&self) -> Ref {
        Ref::new(self.inner.clone())
    }
}

impl From<Computed> for Ref {
    fn from(computed: Computed) -> Self {
        Ref::new(computed.inner)
    }
}

impl From<&Computed> for Ref {
    fn from(computed: &Computed) -> Self {
        computed.to_ref()
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Ref(computed.into())
    }
}

impl From<&Computed> for Value {
    fn from(computed: &Computed) -> Self {
        Value::Ref(computed.to_ref())
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("readonly", &self.is_readonly())
            .field("effect", &self.inner.effect.id())
            .finish()
    }
}

/// A read-only computed value.
pub fn computed<F, R>(getter: F) -> Computed
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
{
    Computed::build(getter, None)
}

/// A computed value whose writes are forwarded to `setter`.
pub fn computed_with_setter<F, R, S>(getter: F, setter: S) -> Computed
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
    S: Fn(Value) + 'static,
{
    Computed::build(getter, Some(Box::new(setter)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_warnings;
    use crate::object::{is_readonly, reactive, Object};
    use crate::reactive::{effect, ref_, Runtime, RuntimeConfig};

    fn number(value: Value) -> f64 {
        value.as_number().unwrap_or(f64::NAN)
    }

    #[test]
    fn computed_is_lazy() {
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let value = computed(move || {
            call_count_clone.set(call_count_clone.get() + 1);
            42
        });

        // Not computed yet
        assert_eq!(value.state(), ComputedState::Dirty);
        assert_eq!(call_count.get(), 0);

        assert_eq!(value.get(), 42);
        assert_eq!(call_count.get(), 1);
        assert_eq!(value.state(), ComputedState::Clean);
    }

    #[test]
    fn computed_caches_until_a_dependency_changes() {
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();
        let count = ref_(1);
        let source = count.clone();

        let doubled = computed(move || {
            call_count_clone.set(call_count_clone.get() + 1);
            number(source.get()) * 2.0
        });

        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(call_count.get(), 1);

        count.set(5);
        assert_eq!(doubled.state(), ComputedState::Dirty);
        assert_eq!(call_count.get(), 1);

        assert_eq!(doubled.get(), 10);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn repeated_invalidation_recomputes_once() {
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();
        let count = ref_(0);
        let source = count.clone();

        let value = computed(move || {
            call_count_clone.set(call_count_clone.get() + 1);
            source.get()
        });
        value.get();

        count.set(1);
        count.set(2);
        count.set(3);
        assert_eq!(value.get(), 3);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn effects_rerun_through_computed() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let state = reactive(Object::record_from([("n", 1)]));
        let source = state.clone();
        let plus_one = computed(move || number(source.get("n")) + 1.0);

        let reader = plus_one.clone();
        let _runner = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                reader.get()
            },
            EffectOptions::default(),
        );

        state.set("n", 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(plus_one.get(), 3);
    }

    #[test]
    fn chained_computed_values() {
        let count = ref_(1);
        let source = count.clone();
        let doubled = computed(move || number(source.get()) * 2.0);
        let inner = doubled.clone();
        let quadrupled = computed(move || number(inner.get()) * 2.0);

        assert_eq!(quadrupled.get(), 4);
        count.set(2);
        assert_eq!(quadrupled.get(), 8);
    }

    #[test]
    fn getter_only_computed_is_readonly() {
        Runtime::install(RuntimeConfig::development());
        let value = computed(|| 1);

        assert!(value.is_readonly());
        assert!(is_readonly(&Value::from(&value)));
        value.set(2);
        assert_eq!(value.get(), 1);
        assert_eq!(take_warnings(), vec![ReactivityError::ReadonlyComputed]);
        assert_eq!(value.try_set(2), Err(ReactivityError::ReadonlyComputed));
    }

    #[test]
    fn setter_receives_writes() {
        let count = ref_(1);
        let (source, sink) = (count.clone(), count.clone());
        let plus_one = computed_with_setter(
            move || number(source.get()) + 1.0,
            move |value| sink.set(number(value) - 1.0),
        );

        assert!(!plus_one.is_readonly());
        plus_one.set(10);
        assert_eq!(count.get(), 9);
        assert_eq!(plus_one.get(), 10);
        assert_eq!(plus_one.try_set(3), Ok(()));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn stopped_computed_keeps_its_value() {
        let count = ref_(1);
        let source = count.clone();
        let value = computed(move || source.get());

        assert_eq!(value.get(), 1);
        value.effect().stop();
        count.set(2);
        assert_eq!(value.state(), ComputedState::Clean);
        assert_eq!(value.get(), 1);
    }

    #[test]
    fn computed_as_ref_shares_cache() {
        let value = computed(|| 7);
        let as_ref = value.to_ref();
        assert_eq!(as_ref.get(), 7);
        assert_eq!(value.state(), ComputedState::Clean);
        assert!(as_ref.ptr_eq(&value.to_ref()));
    }
}
