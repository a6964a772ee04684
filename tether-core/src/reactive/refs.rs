//! Boxed References
//!
//! A [`Ref`] is a single mutable cell with identity. Reading `get()` inside
//! an effect subscribes the effect to the ref's `value` slot; writing a
//! changed value notifies those subscribers.
//!
//! # Variants
//!
//! All variants share the [`Ref`] handle and differ only in how they store
//! and compare:
//!
//! - [`ref_`] wraps object values with `reactive` and compares raw forms.
//! - [`shallow_ref`] stores values as given.
//! - [`custom_ref`] hands tracking and notification to user hooks.
//! - [`to_ref`] projects one key of a container; it has no storage of its
//!   own and relies on the container's tracking.
//! - [`Computed`](super::Computed) is read-only unless it has a setter.
//!
//! # Auto-unwrapping
//!
//! Refs stored in deep reactive records are unwrapped on read and written
//! through on assignment. [`proxy_refs`] gives the same behaviour for plain
//! records.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::untracked;
use super::runtime::Runtime;
use crate::error::{warn, ReactivityError};
use crate::graph::{track, trigger, Change, DepsMap, TargetRef, TrackKey, TrackOp, TriggerOp};
use crate::object::{is_proxy, is_reactive, to_raw, to_reactive, ContainerKind, Object, REF_UNWRAP_HANDLER};
use crate::value::{has_changed, Value};

/// Storage and comparison strategy behind a [`Ref`].
pub(crate) trait RefImpl {
    fn get(&self, this: &Ref) -> Value;

    fn set(&self, this: &Ref, value: Value);

    fn deps(&self) -> &DepsMap;

    fn is_shallow(&self) -> bool {
        false
    }

    fn is_readonly(&self) -> bool {
        false
    }

    fn label(&self) -> &'static str;
}

/// Shared handle to a boxed reference. Clones share the cell.
#[derive(Clone)]
pub struct Ref(pub(crate) Rc<dyn RefImpl>);

impl Ref {
    pub(crate) fn new(inner: Rc<dyn RefImpl>) -> Self {
        Self(inner)
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.0.get(self)
    }

    /// Write the value. Subscribers are notified only when it changed.
    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(self, value.into())
    }

    /// Read, transform and write back.
    pub fn update(&self, f: impl FnOnce(Value) -> Value) {
        let next = f(self.get());
        self.set(next);
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn is_shallow(&self) -> bool {
        self.0.is_shallow()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.is_readonly()
    }

    pub(crate) fn deps(&self) -> &DepsMap {
        self.0.deps()
    }

    fn track_value(&self) {
        track(TargetRef::Ref(self), TrackOp::Get, TrackKey::ref_value());
    }

    fn trigger_value(&self, change: Change) {
        trigger(TargetRef::Ref(self), change);
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Ref {}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.0.label(), self.addr())
    }
}

// ----------------------------------------------------------------------------
// Plain refs
// ----------------------------------------------------------------------------

struct PlainRef {
    /// The value with every wrapper stripped, used for change detection.
    raw: RefCell<Value>,
    value: RefCell<Value>,
    shallow: bool,
    deps: DepsMap,
}

impl PlainRef {
    fn new(value: Value, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (to_raw(&value), to_reactive(value))
        };
        Self {
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            shallow,
            deps: DepsMap::default(),
        }
    }
}

impl RefImpl for PlainRef {
    fn get(&self, this: &Ref) -> Value {
        this.track_value();
        self.value.borrow().clone()
    }

    fn set(&self, this: &Ref, value: Value) {
        let raw = if self.shallow { value.clone() } else { to_raw(&value) };
        if !has_changed(&raw, &self.raw.borrow()) {
            return;
        }
        let stored = if self.shallow { value } else { to_reactive(value) };
        let old = self.value.replace(stored.clone());
        *self.raw.borrow_mut() = raw;

        this.trigger_value(
            Change::new(TriggerOp::Set, Some(TrackKey::ref_value()))
                .with_new(stored)
                .with_old(old),
        );
    }

    fn deps(&self) -> &DepsMap {
        &self.deps
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn label(&self) -> &'static str {
        if self.shallow {
            "ShallowRef"
        } else {
            "Ref"
        }
    }
}

fn create_ref(value: Value, shallow: bool) -> Ref {
    if let Value::Ref(existing) = value {
        return existing;
    }
    Ref::new(Rc::new(PlainRef::new(value, shallow)))
}

/// A deep ref. Passing a value that is already a ref returns that ref.
pub fn ref_(value: impl Into<Value>) -> Ref {
    create_ref(value.into(), false)
}

/// A ref that stores object values as given.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    create_ref(value.into(), true)
}

// ----------------------------------------------------------------------------
// Custom refs
// ----------------------------------------------------------------------------

/// Tracking and notification callbacks handed to a [`custom_ref`] factory.
#[derive(Clone)]
pub struct RefHooks {
    this: Weak<CustomRef>,
}

impl RefHooks {
    fn with_ref(&self, f: impl FnOnce(&Ref)) {
        if let Some(inner) = self.this.upgrade() {
            f(&Ref::new(inner));
        }
    }

    /// Subscribe the running effect to this ref.
    pub fn track(&self) {
        self.with_ref(Ref::track_value);
    }

    /// Notify this ref's subscribers.
    pub fn trigger(&self) {
        self.with_ref(|r| r.trigger_value(Change::new(TriggerOp::Set, Some(TrackKey::ref_value()))));
    }
}

impl fmt::Debug for RefHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefHooks")
            .field("alive", &(self.this.strong_count() > 0))
            .finish()
    }
}

struct CustomRef {
    getter: Box<dyn Fn() -> Value>,
    setter: Box<dyn Fn(Value)>,
    deps: DepsMap,
}

impl RefImpl for CustomRef {
    fn get(&self, _this: &Ref) -> Value {
        (self.getter)()
    }

    fn set(&self, _this: &Ref, value: Value) {
        (self.setter)(value)
    }

    fn deps(&self) -> &DepsMap {
        &self.deps
    }

    fn label(&self) -> &'static str {
        "CustomRef"
    }
}

/// A ref whose reads and writes are implemented by the caller.
///
/// `factory` receives [`RefHooks`] bound to the new ref and returns the get
/// and set functions. The get function should call `hooks.track()` and the
/// set function `hooks.trigger()` when appropriate, which makes it possible
/// to debounce or filter notifications.
///
/// ```rust,ignore
/// let text = custom_ref(|hooks| {
///     let value = Rc::new(RefCell::new(Value::from("")));
///     let (read, write) = (value.clone(), value);
///     let track = hooks.clone();
///     (
///         move || { track.track(); read.borrow().clone() },
///         move |next| { *write.borrow_mut() = next; hooks.trigger(); },
///     )
/// });
/// ```
pub fn custom_ref<F, G, S>(factory: F) -> Ref
where
    F: FnOnce(RefHooks) -> (G, S),
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    let inner = Rc::new_cyclic(|this: &Weak<CustomRef>| {
        let (getter, setter) = factory(RefHooks { this: this.clone() });
        CustomRef {
            getter: Box::new(getter),
            setter: Box::new(setter),
            deps: DepsMap::default(),
        }
    });
    Ref::new(inner)
}

// ----------------------------------------------------------------------------
// Field projections
// ----------------------------------------------------------------------------

struct FieldRef {
    object: Object,
    key: Value,
    deps: DepsMap,
}

impl RefImpl for FieldRef {
    fn get(&self, _this: &Ref) -> Value {
        self.object.get(self.key.clone())
    }

    fn set(&self, _this: &Ref, value: Value) {
        self.object.set(self.key.clone(), value);
    }

    fn deps(&self) -> &DepsMap {
        &self.deps
    }

    fn label(&self) -> &'static str {
        "FieldRef"
    }
}

/// A ref reading and writing `key` of `object`.
///
/// When the field already holds a ref (as seen through `object`), that ref
/// is returned instead. Through a reactive wrapper the ref is unwrapped on
/// read, so the projection reaches it by writing through.
pub fn to_ref(object: &Object, key: impl Into<Value>) -> Ref {
    let key = key.into();
    if let Value::Ref(existing) = untracked(|| object.get(key.clone())) {
        return existing;
    }
    Ref::new(Rc::new(FieldRef {
        object: object.clone(),
        key,
        deps: DepsMap::default(),
    }))
}

/// Project every own key of `object` into a [`to_ref`].
///
/// Arrays produce an array of refs, maps and sets a map, everything else a
/// record. The result itself is raw. Warns when `object` is not a wrapper,
/// since the projections would not be reactive.
pub fn to_refs(object: &Object) -> Object {
    if !is_proxy(object) {
        warn(ReactivityError::ToRefsOnPlainObject);
    }

    let keys = object.own_keys();
    match object.kind() {
        ContainerKind::Array => Object::array_from(keys.into_iter().map(|key| to_ref(object, key))),
        kind if kind.is_collection() => {
            Object::map_from(keys.into_iter().map(|key| (key.clone(), to_ref(object, key))))
        }
        _ => {
            let result = Object::record();
            for key in keys {
                let field = to_ref(object, key.clone());
                result.set(key, field);
            }
            result
        }
    }
}

/// Notify the subscribers of `r` without changing it. Useful after mutating
/// the inside of a shallow ref's value.
pub fn trigger_ref(r: &Ref) {
    let mut change = Change::new(TriggerOp::Set, Some(TrackKey::ref_value()));
    if Runtime::current().config().debug_hooks {
        change = change.with_new(untracked(|| r.get()));
    }
    r.trigger_value(change);
}

/// The value behind a ref, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// Make ref fields of `object` read and write like plain fields.
///
/// Reactive wrappers already behave this way and are returned unchanged.
pub fn proxy_refs(object: Object) -> Object {
    if is_reactive(&object) {
        return object;
    }
    Object::new_proxy(object, &REF_UNWRAP_HANDLER)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_warnings;
    use crate::object::{is_reactive, reactive};
    use crate::reactive::{effect, Effect, EffectOptions, RuntimeConfig};
    use std::cell::Cell;

    fn watch(r: &Ref) -> (Effect, Rc<Cell<i32>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let r = r.clone();
        let runner = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                r.get()
            },
            EffectOptions::default(),
        );
        (runner, runs)
    }

    #[test]
    fn ref_round_trip() {
        let count = ref_(1);
        assert_eq!(count.get(), 1);
        count.set(2);
        assert_eq!(count.get(), 2);
        count.update(|v| Value::from(v.as_number().unwrap_or(0.0) + 1.0));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn ref_notifies_on_change_only() {
        let count = ref_(1);
        let (_runner, runs) = watch(&count);

        count.set(1);
        assert_eq!(runs.get(), 1);
        count.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nan_writes_are_no_ops() {
        let value = ref_(f64::NAN);
        let (_runner, runs) = watch(&value);
        value.set(f64::NAN);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn ref_of_ref_is_identity() {
        let a = ref_(1);
        assert!(ref_(&a).ptr_eq(&a));
        assert!(shallow_ref(&a).ptr_eq(&a));
    }

    #[test]
    fn deep_refs_wrap_objects() {
        let raw = Object::record();
        let deep = ref_(raw.clone());
        assert!(is_reactive(&deep.get()));

        let shallow = shallow_ref(raw.clone());
        assert_eq!(shallow.get(), Value::from(&raw));
        assert!(shallow.is_shallow());
    }

    #[test]
    fn deep_ref_compares_raw_forms() {
        let raw = Object::record();
        let holder = ref_(raw.clone());
        let (_runner, runs) = watch(&holder);

        holder.set(reactive(raw));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn shallow_ref_needs_manual_trigger_for_inner_mutation() {
        let inner = Object::record_from([("n", 1)]);
        let holder = shallow_ref(inner.clone());
        let (_runner, runs) = watch(&holder);

        inner.set("n", 2);
        assert_eq!(runs.get(), 1);
        trigger_ref(&holder);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn custom_ref_uses_hooks() {
        let store = Rc::new(Cell::new(0.0));
        let (read, write) = (store.clone(), store.clone());
        let r = custom_ref(move |hooks| {
            let track = hooks.clone();
            (
                move || {
                    track.track();
                    Value::from(read.get())
                },
                move |next: Value| {
                    let next = next.as_number().unwrap_or(0.0);
                    if next >= 0.0 {
                        write.set(next);
                        hooks.trigger();
                    }
                },
            )
        });
        let (_runner, runs) = watch(&r);

        r.set(3);
        assert_eq!(runs.get(), 2);
        assert_eq!(r.get(), 3);
        r.set(-1);
        assert_eq!(runs.get(), 2);
        assert_eq!(store.get(), 3.0);
    }

    #[test]
    fn to_ref_projects_a_field() {
        let state = reactive(Object::record_from([("a", 1)]));
        let a = to_ref(&state, "a");
        let (_runner, runs) = watch(&a);

        state.set("a", 2);
        assert_eq!(runs.get(), 2);
        a.set(3);
        assert_eq!(state.get("a"), 3);
    }

    #[test]
    fn to_ref_returns_existing_refs() {
        let inner = ref_(1);
        let raw = Object::record_from([("r", Value::from(&inner))]);
        assert!(to_ref(&raw, "r").ptr_eq(&inner));
    }

    #[test]
    fn to_refs_projects_every_key() {
        let state = reactive(Object::record_from([("a", 1), ("b", 2)]));
        let refs = to_refs(&state);

        let a = refs.get("a");
        assert!(is_ref(&a));
        assert_eq!(unref(&a), 1);
        assert!(!is_reactive(&refs));

        let array = to_refs(&reactive(Object::array_from([1, 2])));
        assert_eq!(array.kind(), ContainerKind::Array);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn to_refs_warns_on_plain_objects() {
        Runtime::install(RuntimeConfig::development());
        to_refs(&Object::record());
        assert_eq!(take_warnings(), vec![ReactivityError::ToRefsOnPlainObject]);
    }

    #[test]
    fn proxy_refs_keeps_reactive_objects() {
        let state = reactive(Object::record());
        assert_eq!(proxy_refs(state.clone()), state);
    }

    #[test]
    fn unref_passes_plain_values_through() {
        assert_eq!(unref(&Value::from(1)), 1);
        assert!(!is_ref(&Value::from(1)));
    }
}
