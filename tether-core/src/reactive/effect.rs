//! Effect Implementation
//!
//! An Effect is a re-runnable computation that re-executes whenever the
//! reactive state it read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. Every run starts by removing the effect from all dependency sets it
//!    joined during the previous run, then records a fresh set while the
//!    body executes. Branches that are no longer taken stop notifying.
//!
//! 3. When any dependency changes, the effect is handed to its scheduler,
//!    or re-run synchronously when it has none.
//!
//! # Ownership
//!
//! Dependency sets only hold effects weakly. The [`Effect`] handle (and its
//! clones) own the effect: dropping the last handle detaches it from the
//! graph, exactly as if it had been stopped.
//!
//! # Stopped Effects
//!
//! A stopped effect never re-runs in response to a change. Calling
//! [`Effect::run`] on it directly still runs the bare body once (without
//! recording dependencies) when the effect has no scheduler, and returns
//! `Undefined` without running anything when it does.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::{untracked, ReactiveContext};
use super::runtime::Runtime;
use super::subscriber::SubscriberId;
use crate::graph::{DebuggerEvent, Dep};
use crate::value::Value;

/// The body shared by every run of an effect.
pub type EffectBody = Rc<dyn Fn() -> Value>;

/// Receives an effect that should re-run, instead of running it directly.
pub type Scheduler = Rc<dyn Fn(&Effect)>;

/// Development hook observing graph activity.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Options accepted by [`effect`] and [`Effect::new`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    pub scheduler: Option<Scheduler>,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
    pub on_stop: Option<Rc<dyn Fn()>>,
    /// Let the effect be re-triggered by its own writes.
    pub allow_recurse: bool,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .finish()
    }
}

/// Anything that can become the body of an effect.
///
/// Closures returning anything convertible into a [`Value`] qualify. An
/// existing [`Effect`] contributes its underlying body, so wrapping an effect
/// in another effect never nests them.
pub trait IntoEffectBody {
    fn into_body(self) -> EffectBody;
}

impl<F, R> IntoEffectBody for F
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
{
    fn into_body(self) -> EffectBody {
        Rc::new(move || self().into())
    }
}

impl IntoEffectBody for Effect {
    fn into_body(self) -> EffectBody {
        self.inner.body.clone()
    }
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    body: EffectBody,
    active: Cell<bool>,
    deps: RefCell<SmallVec<[Rc<Dep>; 4]>>,
    run_count: Cell<usize>,
    options: EffectOptions,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for dep in self.deps.get_mut().drain(..) {
            dep.remove(self.id);
        }
        tracing::debug!(effect = %self.id, "effect dropped");
    }
}

/// A re-runnable subscriber.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::record_from([("count", 0)]));
///
/// let state_clone = state.clone();
/// let runner = effect(move || {
///     println!("count is {}", state_clone.get("count"));
/// }, EffectOptions::default());
///
/// state.set("count", 5);  // Prints: "count is 5"
/// ```
#[derive(Clone)]
#[must_use = "dropping the handle detaches the effect"]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect without running it.
    pub fn new(body: impl IntoEffectBody, options: EffectOptions) -> Self {
        Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                body: body.into_body(),
                active: Cell::new(true),
                deps: RefCell::new(SmallVec::new()),
                run_count: Cell::new(0),
                options,
            }),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.options.allow_recurse
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Number of dependency sets the effect is currently a member of.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the body and return its result.
    ///
    /// Runs that would re-enter an effect already on the stack return
    /// `Undefined` without running.
    pub fn run(&self) -> Value {
        if !self.is_active() {
            return match self.inner.options.scheduler {
                Some(_) => Value::Undefined,
                None => untracked(|| (self.inner.body)()),
            };
        }

        let runtime = Runtime::current();
        if runtime.context().is_running(self.id()) {
            return Value::Undefined;
        }

        self.cleanup();
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        let _context = ReactiveContext::enter(runtime, self);
        (self.inner.body)()
    }

    /// Detach from the graph for good. Calling `stop` again does nothing.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = self.inner.options.on_stop.clone() {
            on_stop();
        }
        self.inner.active.set(false);
        tracing::debug!(effect = %self.id(), "effect stopped");
    }

    pub(crate) fn downgrade(&self) -> Weak<EffectInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<EffectInner>) -> Option<Effect> {
        weak.upgrade().map(|inner| Effect { inner })
    }

    pub(crate) fn record_dependency(&self, dep: Rc<Dep>) {
        self.inner.deps.borrow_mut().push(dep);
    }

    /// Remove the effect from every dependency set it joined.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id());
        }
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create an effect and run it immediately unless `options.lazy` is set.
#[must_use = "dropping the handle detaches the effect"]
pub fn effect(body: impl IntoEffectBody, options: EffectOptions) -> Effect {
    let lazy = options.lazy;
    let effect = Effect::new(body, options);
    if !lazy {
        effect.run();
    }
    effect
}

/// Stop `effect`. See [`Effect::stop`].
pub fn stop(effect: &Effect) {
    effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
