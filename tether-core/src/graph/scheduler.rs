//! Update Scheduler
//!
//! [`track`] records edges, [`trigger`] decides which effects a write reaches
//! and runs them.
//!
//! # Algorithm
//!
//! A trigger collects dependency sets according to the operation:
//!
//! 1. `clear` reaches every key of the target
//! 2. writing an array's `length` reaches the length itself and every index
//!    at or beyond the new length
//! 3. otherwise the written key is reached, plus the structural keys:
//!    - `add` reaches the iteration key (or `length` for a new array index)
//!      and, on maps, the key-iteration key
//!    - `delete` reaches the same keys as `add` except for arrays
//!    - `set` on a map reaches the iteration key, since entry iteration
//!      observes values
//!
//! The collected effects are deduplicated in first-seen order. The effect
//! that is currently running is skipped unless it opted into recursion, and
//! stopped effects are skipped as well. Every remaining effect is then handed
//! to its scheduler, or run synchronously when it has none.

use std::rc::Rc;

use indexmap::IndexMap;

use super::deps::{Dep, TargetRef, TrackKey};
use super::operations::{DebugOp, DebuggerEvent, TrackOp, TriggerOp};
use crate::object::ContainerKind;
use crate::reactive::{Effect, Runtime, SubscriberId};
use crate::value::Value;

/// A write being propagated through the graph.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub(crate) op: TriggerOp,
    pub(crate) key: Option<TrackKey>,
    pub(crate) new_value: Option<Value>,
    pub(crate) old_value: Option<Value>,
    pub(crate) old_target: Option<Value>,
}

impl Change {
    pub(crate) fn new(op: TriggerOp, key: Option<TrackKey>) -> Self {
        Self {
            op,
            key,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub(crate) fn with_new(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub(crate) fn with_old(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub(crate) fn with_old_target(mut self, target: Option<Value>) -> Self {
        self.old_target = target;
        self
    }
}

/// Ordered, deduplicated set of effects to notify.
struct RunSet {
    effects: IndexMap<SubscriberId, Effect>,
    active: Option<Effect>,
}

impl RunSet {
    fn new(active: Option<Effect>) -> Self {
        Self {
            effects: IndexMap::new(),
            active,
        }
    }

    fn add(&mut self, dep: Option<Rc<Dep>>) {
        let Some(dep) = dep else { return };
        for effect in dep.live_subscribers() {
            let is_active = self
                .active
                .as_ref()
                .is_some_and(|active| active.id() == effect.id());
            if is_active && !effect.allow_recurse() {
                continue;
            }
            self.effects.entry(effect.id()).or_insert(effect);
        }
    }

    fn add_all(&mut self, deps: Vec<Rc<Dep>>) {
        for dep in deps {
            self.add(Some(dep));
        }
    }
}

/// Record that the running effect read `key` of `target`.
///
/// No-op when tracking is paused or no effect is running. An effect that
/// stopped itself mid-run records nothing more. Re-reading a key within one
/// run adds nothing and does not fire `on_track` again.
pub(crate) fn track(target: TargetRef<'_>, op: TrackOp, key: TrackKey) {
    let runtime = Runtime::current();
    let context = runtime.context();
    if !context.should_track() {
        return;
    }
    let Some(effect) = context.active_effect() else {
        return;
    };
    if !effect.is_active() {
        return;
    }

    let dep = target.deps().get_or_insert(&key);
    if dep.contains(effect.id()) {
        return;
    }
    dep.insert(&effect);
    effect.record_dependency(dep);

    if runtime.config().debug_hooks {
        if let Some(hook) = effect.options().on_track.clone() {
            hook(&DebuggerEvent::track(effect.clone(), target.to_owned(), op, key));
        }
    }
}

/// Notify the effects reached by `change` on `target`.
pub(crate) fn trigger(target: TargetRef<'_>, change: Change) {
    let deps = target.deps();
    if deps.is_empty() {
        return;
    }

    let runtime = Runtime::current();
    let kind = target.kind();
    let is_array = kind == Some(ContainerKind::Array);
    let is_map = kind == Some(ContainerKind::Map);

    let mut run = RunSet::new(runtime.context().active_effect());
    match (change.op, &change.key) {
        (TriggerOp::Clear, _) => run.add_all(deps.all()),
        (_, Some(TrackKey::Length)) if is_array => {
            let new_length = change
                .new_value
                .as_ref()
                .and_then(Value::as_length)
                .unwrap_or(0);
            run.add_all(deps.matching(|key| match key {
                TrackKey::Length => true,
                TrackKey::Index(index) => *index >= new_length,
                _ => false,
            }));
        }
        (op, key) => {
            if let Some(key) = key {
                run.add(deps.get(key));
            }
            match op {
                TriggerOp::Add if is_array => {
                    if matches!(key, Some(TrackKey::Index(_))) {
                        run.add(deps.get(&TrackKey::Length));
                    }
                }
                TriggerOp::Add | TriggerOp::Delete if !is_array => {
                    run.add(deps.get(&TrackKey::Iterate));
                    if is_map {
                        run.add(deps.get(&TrackKey::MapKeyIterate));
                    }
                }
                TriggerOp::Set if is_map => run.add(deps.get(&TrackKey::Iterate)),
                _ => {}
            }
        }
    }

    if run.effects.is_empty() {
        return;
    }
    tracing::trace!(
        op = %change.op,
        key = ?change.key,
        effects = run.effects.len(),
        "trigger"
    );

    let debug_hooks = runtime.config().debug_hooks;
    drop(runtime);

    for effect in run.effects.into_values() {
        // An earlier effect in this batch may have stopped this one.
        if !effect.is_active() {
            continue;
        }
        if debug_hooks {
            if let Some(hook) = effect.options().on_trigger.clone() {
                hook(&DebuggerEvent {
                    effect: effect.clone(),
                    target: target.to_owned(),
                    op: DebugOp::Trigger(change.op),
                    key: change.key.clone(),
                    new_value: change.new_value.clone(),
                    old_value: change.old_value.clone(),
                    old_target: change.old_target.clone(),
                });
            }
        }
        match effect.options().scheduler.clone() {
            Some(scheduler) => scheduler(&effect),
            None => {
                effect.run();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Target;
    use crate::object::{reactive, Object};
    use crate::reactive::{effect, EffectOptions, RuntimeConfig};
    use std::cell::{Cell, RefCell};

    #[test]
    fn untracked_targets_skip_the_graph() {
        let object = Object::record();
        // Nothing ever read this container, so there is nothing to reach.
        trigger(
            TargetRef::Object(&object),
            Change::new(TriggerOp::Set, Some(TrackKey::Prop("a".into()))),
        );
        assert!(object.raw().deps().is_empty());
    }

    #[test]
    fn effects_are_notified_once_per_trigger() {
        let state = reactive(Object::record_from([("a", 1)]));
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let state_clone = state.clone();
        let _effect = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                // Iteration and the key itself both land in the run set.
                state_clone.own_keys();
                state_clone.get("a")
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);

        state.delete("a");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn tracking_is_idempotent_within_a_run() {
        let state = reactive(Object::record_from([("a", 1)]));
        let state_clone = state.clone();
        let runner = effect(
            move || {
                state_clone.get("a");
                state_clone.get("a")
            },
            EffectOptions::default(),
        );

        assert_eq!(runner.dependency_count(), 1);
        let key = TrackKey::Prop("a".into());
        assert_eq!(state.raw().deps().subscriber_count(&key), 1);
    }

    #[test]
    fn on_track_reports_each_new_edge() {
        Runtime::install(RuntimeConfig::development());
        let raw = Object::record_from([("a", 1)]);
        let state = reactive(raw.clone());
        let events: Rc<RefCell<Vec<DebuggerEvent>>> = Rc::default();
        let events_clone = events.clone();

        let state_clone = state.clone();
        let runner = effect(
            move || {
                state_clone.get("a");
                state_clone.get("a");
                state_clone.has("b")
            },
            EffectOptions::new().on_track(move |event| events_clone.borrow_mut().push(event.clone())),
        );

        {
            let events = events.borrow();
            assert_eq!(events.len(), 2);

            assert!(events[0].effect.ptr_eq(&runner));
            assert_eq!(events[0].target, Target::Object(raw.clone()));
            assert_eq!(events[0].op, DebugOp::Track(TrackOp::Get));
            assert_eq!(events[0].key, Some(TrackKey::Prop("a".into())));
            assert_eq!(events[0].new_value, None);

            assert_eq!(events[1].op, DebugOp::Track(TrackOp::Has));
            assert_eq!(events[1].key, Some(TrackKey::Prop("b".into())));
        }

        // The events hold the effect, which holds the hook.
        events.borrow_mut().clear();
    }

    #[test]
    fn allow_recurse_admits_the_running_effect() {
        let state = reactive(Object::record_from([("a", 0), ("b", 0)]));
        let recursive_calls = Rc::new(Cell::new(0));
        let recursive_calls_clone = recursive_calls.clone();
        let guarded_calls = Rc::new(Cell::new(0));
        let guarded_calls_clone = guarded_calls.clone();

        let state_clone = state.clone();
        let _recursive = effect(
            move || {
                let a = state_clone.get("a").as_number().unwrap_or(0.0);
                state_clone.set("a", a + 1.0)
            },
            EffectOptions::new()
                .allow_recurse()
                .scheduler(move |_| recursive_calls_clone.set(recursive_calls_clone.get() + 1)),
        );

        let state_clone = state.clone();
        let _guarded = effect(
            move || {
                let b = state_clone.get("b").as_number().unwrap_or(0.0);
                state_clone.set("b", b + 1.0)
            },
            EffectOptions::new().scheduler(move |_| guarded_calls_clone.set(guarded_calls_clone.get() + 1)),
        );

        assert_eq!(recursive_calls.get(), 1);
        assert_eq!(guarded_calls.get(), 0);
        assert_eq!(state.get("a"), 1);
        assert_eq!(state.get("b"), 1);
    }
}
