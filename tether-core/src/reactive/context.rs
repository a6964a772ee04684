//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and
//! whether reads should be recorded at all.
//!
//! # Implementation
//!
//! The [`TrackingContext`] lives on the thread's [`Runtime`]. It holds:
//!
//! - the stack of running effects, whose top is the *active* effect
//! - the `should_track` flag
//! - a stack of saved `should_track` values, so pause/enable calls nest
//!
//! Running an effect goes through the [`ReactiveContext`] guard, which
//! enables tracking and pushes the effect on entry, and restores both when it
//! is dropped. Because restoration happens in `Drop`, a panicking effect body
//! leaves the context exactly as it found it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::Effect;
use super::runtime::Runtime;
use super::SubscriberId;

/// Per-runtime tracking state.
pub struct TrackingContext {
    stack: RefCell<Vec<Effect>>,
    should_track: Cell<bool>,
    track_stack: RefCell<Vec<bool>>,
}

impl TrackingContext {
    pub fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
        }
    }

    /// The effect whose body is currently executing, if any.
    pub fn active_effect(&self) -> Option<Effect> {
        self.stack.borrow().last().cloned()
    }

    /// Whether the effect is anywhere on the stack.
    pub fn is_running(&self, id: SubscriberId) -> bool {
        self.stack.borrow().iter().any(|effect| effect.id() == id)
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn should_track(&self) -> bool {
        self.should_track.get()
    }

    /// Stop recording reads until the matching [`reset`](Self::reset).
    pub fn pause(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    /// Force reads to be recorded until the matching [`reset`](Self::reset).
    pub fn enable(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    /// Restore the flag saved by the last `pause` or `enable`.
    ///
    /// An unbalanced reset falls back to tracking enabled.
    pub fn reset(&self) {
        let last = self.track_stack.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }

    fn push(&self, effect: Effect) {
        self.stack.borrow_mut().push(effect);
    }

    fn pop(&self) -> Option<Effect> {
        self.stack.borrow_mut().pop()
    }
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingContext")
            .field("depth", &self.depth())
            .field("should_track", &self.should_track())
            .field("saved", &self.track_stack.borrow().len())
            .finish()
    }
}

/// Guard that keeps an effect active while its body runs.
pub struct ReactiveContext {
    runtime: Rc<Runtime>,
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter the context of `effect` on `runtime`.
    ///
    /// The context is exited when the returned guard is dropped.
    pub(crate) fn enter(runtime: Rc<Runtime>, effect: &Effect) -> Self {
        let context = runtime.context();
        context.enable();
        context.push(effect.clone());
        Self {
            subscriber_id: effect.id(),
            runtime,
        }
    }

    /// Check if an effect is running on this thread.
    pub fn is_active() -> bool {
        Runtime::current().context().depth() > 0
    }

    /// Get the ID of the running effect, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Runtime::current().context().active_effect().map(|e| e.id())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let context = self.runtime.context();
        let popped = context.pop();
        context.reset();

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                effect.id()
            );
        }
    }
}

/// Guard that pauses tracking for its lifetime.
pub(crate) struct TrackingPause {
    runtime: Rc<Runtime>,
}

impl TrackingPause {
    pub(crate) fn new() -> Self {
        let runtime = Runtime::current();
        runtime.context().pause();
        Self { runtime }
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        self.runtime.context().reset();
    }
}

/// Stop recording reads on the current runtime.
pub fn pause_tracking() {
    Runtime::current().context().pause();
}

/// Force reads to be recorded on the current runtime.
pub fn enable_tracking() {
    Runtime::current().context().enable();
}

/// Undo the last [`pause_tracking`] or [`enable_tracking`].
pub fn reset_tracking() {
    Runtime::current().context().reset();
}

/// Run `f` without recording any reads, then restore the previous state.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}

/// Whether a read right now would record a dependency.
pub fn is_tracking() -> bool {
    let runtime = Runtime::current();
    let context = runtime.context();
    context.should_track() && context.depth() > 0
}
