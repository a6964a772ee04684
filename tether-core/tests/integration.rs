//! Integration Tests for the Reactive System
//!
//! These tests verify that wrappers, effects, computed values and refs work
//! together correctly through the public API only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_core::{
    computed, effect, is_reactive, is_readonly, reactive, readonly, ref_, stop, take_warnings,
    to_raw, unref, untracked, Effect, EffectOptions, Object, ReactivityError, Runtime,
    RuntimeConfig, Value,
};

/// Create an effect that counts its runs.
fn counted(body: impl Fn() -> Value + 'static) -> (Effect, Rc<Cell<i32>>) {
    let runs = Rc::new(Cell::new(0));
    let runs_clone = runs.clone();
    let runner = effect(
        move || {
            runs_clone.set(runs_clone.get() + 1);
            body()
        },
        EffectOptions::default(),
    );
    (runner, runs)
}

fn number(value: Value) -> f64 {
    value.as_number().unwrap_or(f64::NAN)
}

/// Wrapping is canonical and `to_raw` recovers the original container.
#[test]
fn wrapper_identity() {
    let raw = Object::record();
    let state = reactive(raw.clone());

    assert_ne!(state, raw);
    assert!(to_raw(&state).ptr_eq(&raw));
    assert_eq!(reactive(state.clone()), state);
    assert_eq!(reactive(raw), state);
}

/// A write re-runs a dependent effect exactly once, an equal write never.
#[test]
fn effect_reruns_once_per_change() {
    let state = reactive(Object::record_from([("x", 1)]));
    let source = state.clone();
    let (_runner, runs) = counted(move || source.get("x"));

    state.set("x", 2);
    assert_eq!(runs.get(), 2);

    state.set("x", 2);
    assert_eq!(runs.get(), 2);

    state.set("x", 3);
    assert_eq!(runs.get(), 3);
}

/// NaN is equal to itself for change detection.
#[test]
fn nan_writes_do_not_notify() {
    let state = reactive(Object::record_from([("x", f64::NAN)]));
    let source = state.clone();
    let (_runner, runs) = counted(move || source.get("x"));

    state.set("x", f64::NAN);
    assert_eq!(runs.get(), 1);
}

/// A computed value caches and recomputes once per invalidation.
#[test]
fn computed_caches_between_changes() {
    let compute_count = Rc::new(Cell::new(0));
    let compute_count_clone = compute_count.clone();

    let state = reactive(Object::record_from([("a", 1)]));
    let source = state.clone();
    let doubled = computed(move || {
        compute_count_clone.set(compute_count_clone.get() + 1);
        number(source.get("a")) * 2.0
    });

    assert_eq!(doubled.get(), 2);
    assert_eq!(doubled.get(), 2);
    assert_eq!(compute_count.get(), 1);

    state.set("a", 5);
    assert_eq!(doubled.get(), 10);
    assert_eq!(doubled.get(), 10);
    assert_eq!(compute_count.get(), 2);
}

/// A stopped effect never re-runs and stopping twice is harmless.
#[test]
fn stopped_effects_stay_stopped() {
    let state = reactive(Object::record_from([("x", 1)]));
    let source = state.clone();
    let (runner, runs) = counted(move || source.get("x"));

    stop(&runner);
    stop(&runner);
    state.set("x", 2);
    assert_eq!(runs.get(), 1);
    assert!(!runner.is_active());
}

/// Calling a stopped effect directly runs its bare body when it has no
/// scheduler and nothing at all when it has one.
#[test]
fn stopped_effect_direct_call_asymmetry() {
    let state = reactive(Object::record_from([("x", 1)]));

    let plain_runs = Rc::new(Cell::new(0));
    let plain_runs_clone = plain_runs.clone();
    let source = state.clone();
    let plain = effect(
        move || {
            plain_runs_clone.set(plain_runs_clone.get() + 1);
            source.get("x")
        },
        EffectOptions::default(),
    );

    let scheduled_runs = Rc::new(Cell::new(0));
    let scheduled_runs_clone = scheduled_runs.clone();
    let source = state.clone();
    let scheduled = effect(
        move || {
            scheduled_runs_clone.set(scheduled_runs_clone.get() + 1);
            source.get("x")
        },
        EffectOptions::new().scheduler(|_| {}),
    );

    plain.stop();
    scheduled.stop();

    assert_eq!(plain.run(), 1);
    assert_eq!(plain_runs.get(), 2);
    assert_eq!(plain.dependency_count(), 0);

    assert_eq!(scheduled.run(), Value::Undefined);
    assert_eq!(scheduled_runs.get(), 1);

    // The bare run recorded nothing.
    state.set("x", 2);
    assert_eq!(plain_runs.get(), 2);
}

/// Adding the same item to a set notifies once.
#[test]
fn set_add_notifies_once() {
    let set = reactive(Object::new_set());
    let source = set.clone();
    let (_runner, runs) = counted(move || Value::from(source.has(1)));

    set.add(1);
    set.add(1);
    assert_eq!(runs.get(), 2);
    assert_eq!(set.size(), 1);
}

/// `push` reaches readers of `length` and of the new index only.
#[test]
fn array_push_notification_scope() {
    let list = reactive(Object::array_from([1, 2, 3]));

    let source = list.clone();
    let (_first, first_runs) = counted(move || source.get(0));
    let source = list.clone();
    let (_second, second_runs) = counted(move || source.get(1));
    let source = list.clone();
    let (_length, length_runs) = counted(move || Value::from(source.len()));
    let source = list.clone();
    let (_fourth, fourth_runs) = counted(move || source.get(3));

    assert_eq!(list.push(4), 4);
    assert_eq!(list.len(), 4);

    assert_eq!(first_runs.get(), 1);
    assert_eq!(second_runs.get(), 1);
    assert_eq!(length_runs.get(), 2);
    assert_eq!(fourth_runs.get(), 2);
}

/// `unref(ref(x))` is `x`, and refs stay boxed below the wrapper.
#[test]
fn ref_round_trips() {
    assert_eq!(unref(&Value::from(ref_(5))), 5);

    let inner = ref_(1);
    let state = reactive(Object::record_from([("a", Value::from(&inner))]));

    assert_eq!(state.get("a"), 1);
    let raw_field = to_raw(&state).get("a");
    assert!(raw_field.as_boxed().is_some_and(|r| r.ptr_eq(&inner)));
}

/// Writing a plain value into a ref field of a reactive record writes
/// through the ref.
#[test]
fn reactive_records_write_through_refs() {
    let inner = ref_(1);
    let state = reactive(Object::record_from([("a", Value::from(&inner))]));
    let source = inner.clone();
    let (_runner, runs) = counted(move || source.get());

    state.set("a", 2);
    assert_eq!(inner.get(), 2);
    assert_eq!(runs.get(), 2);
}

/// Read-only over reactive still reports the reactive flag.
#[test]
fn readonly_preserves_reactive_flag() {
    let view = readonly(reactive(Object::record()));
    assert!(is_reactive(&view));
    assert!(is_readonly(&view));
}

/// A read-only view follows changes made through the reactive wrapper.
#[test]
fn readonly_views_track_the_source() {
    Runtime::install(RuntimeConfig::development());
    let state = reactive(Object::record_from([("x", 1)]));
    let view = readonly(state.clone());
    let source = view.clone();
    let (_runner, runs) = counted(move || source.get("x"));

    state.set("x", 2);
    assert_eq!(runs.get(), 2);

    assert!(view.set("x", 3));
    assert_eq!(state.get("x"), 2);
    assert!(matches!(
        take_warnings().as_slice(),
        [ReactivityError::ReadonlyMutation { .. }]
    ));
}

/// Branches that are no longer taken stop notifying.
#[test]
fn dependencies_follow_branches() {
    let state = reactive(Object::record_from([
        ("flag", Value::from(true)),
        ("a", Value::from(1)),
        ("b", Value::from(2)),
    ]));
    let source = state.clone();
    let (_runner, runs) = counted(move || {
        if source.get("flag") == true {
            source.get("a")
        } else {
            source.get("b")
        }
    });

    state.set("flag", false);
    assert_eq!(runs.get(), 2);

    state.set("a", 10);
    assert_eq!(runs.get(), 2);

    state.set("b", 20);
    assert_eq!(runs.get(), 3);
}

/// Nested objects are wrapped lazily and notify their own readers.
#[test]
fn nested_objects_are_reactive() {
    let state = reactive(Object::record_from([(
        "user",
        Object::record_from([("name", "ada")]),
    )]));
    let names: Rc<RefCell<Vec<Value>>> = Rc::default();
    let names_clone = names.clone();
    let source = state.clone();
    let _runner = effect(
        move || {
            let user = source.get("user");
            let name = user.as_object().map(|u| u.get("name")).unwrap_or_default();
            names_clone.borrow_mut().push(name);
        },
        EffectOptions::default(),
    );

    let user = state.get("user");
    assert!(is_reactive(&user));
    if let Some(user) = user.as_object() {
        user.set("name", "grace");
    }

    assert_eq!(
        *names.borrow(),
        vec![Value::from("ada"), Value::from("grace")]
    );
}

/// Reads inside `untracked` record nothing.
#[test]
fn untracked_reads_are_invisible() {
    let state = reactive(Object::record_from([("x", 1), ("y", 1)]));
    let source = state.clone();
    let (_runner, runs) = counted(move || {
        let x = source.get("x");
        untracked(|| source.get("y"));
        x
    });

    state.set("y", 2);
    assert_eq!(runs.get(), 1);
    state.set("x", 2);
    assert_eq!(runs.get(), 2);
}

/// Dropping the last effect handle detaches the effect.
#[test]
fn dropped_effects_detach() {
    let state = reactive(Object::record_from([("x", 1)]));
    let source = state.clone();
    let (runner, runs) = counted(move || source.get("x"));

    drop(runner);
    state.set("x", 2);
    assert_eq!(runs.get(), 1);
}

/// Map iteration re-runs on additions, `keys()` ignores value updates.
#[test]
fn map_iteration_dependencies() {
    let map = reactive(Object::map_from([("a", 1)]));
    let source = map.clone();
    let (_keys, key_runs) = counted(move || Value::from(source.keys().count()));
    let source = map.clone();
    let (_entries, entry_runs) = counted(move || Value::from(source.entries().count()));

    map.set("a", 2);
    assert_eq!(key_runs.get(), 1);
    assert_eq!(entry_runs.get(), 2);

    map.delete("a");
    assert_eq!(key_runs.get(), 2);
    assert_eq!(entry_runs.get(), 3);
}

/// Snapshots render the current contents without subscribing.
#[test]
fn snapshots_do_not_track() {
    let state = reactive(Object::record_from([("list", Object::array_from([1, 2]))]));
    let source = state.clone();
    let rendered = Rc::new(RefCell::new(serde_json::Value::Null));
    let rendered_clone = rendered.clone();
    let (_runner, runs) = counted(move || {
        *rendered_clone.borrow_mut() = Value::from(&source).to_json();
        Value::Undefined
    });

    assert_eq!(*rendered.borrow(), serde_json::json!({ "list": [1.0, 2.0] }));
    state.set("other", 1);
    assert_eq!(runs.get(), 1);
}
