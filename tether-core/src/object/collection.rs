//! Handlers for maps and sets.
//!
//! Keys are looked up in two forms: as given, and with every wrapper layer
//! stripped. A reactive key therefore finds an entry that was stored under
//! its raw form, and both forms are tracked so either write reaches the
//! reader. Mutations always store raw keys and values.
//!
//! Entry reads are wrapped on the way out with the flavour of the wrapper
//! they were read through.

use super::handler::{Flavor, Handler, Wrap};
use super::observe::to_raw;
use super::{Entries, IterMethod, Object};
use crate::error::{warn, ReactivityError};
use crate::graph::{track, trigger, Change, TargetRef, TrackKey, TrackOp, TriggerOp};
use crate::object::ContainerKind;
use crate::reactive::Runtime;
use crate::value::{has_changed, Value};

pub(crate) struct CollectionHandler {
    readonly: bool,
    shallow: bool,
}

static MUTABLE_COLLECTION_HANDLER: CollectionHandler = CollectionHandler {
    readonly: false,
    shallow: false,
};
static SHALLOW_COLLECTION_HANDLER: CollectionHandler = CollectionHandler {
    readonly: false,
    shallow: true,
};
static READONLY_COLLECTION_HANDLER: CollectionHandler = CollectionHandler {
    readonly: true,
    shallow: false,
};

/// Shallow read-only collections share the deep read-only handler.
pub(crate) fn handler_for(flavor: Flavor) -> &'static dyn Handler {
    match flavor {
        Flavor::Reactive => &MUTABLE_COLLECTION_HANDLER,
        Flavor::ShallowReactive => &SHALLOW_COLLECTION_HANDLER,
        Flavor::Readonly | Flavor::ShallowReadonly => &READONLY_COLLECTION_HANDLER,
    }
}

impl CollectionHandler {
    fn wrap(&self) -> Wrap {
        Wrap::for_mode(self.readonly, self.shallow)
    }

    fn track(&self, target: &Object, op: TrackOp, key: TrackKey) {
        if !self.readonly {
            track(TargetRef::Object(target), op, key);
        }
    }

    /// Track both forms of `key` on the raw target.
    fn track_key(&self, raw_target: &Object, op: TrackOp, key: &Value, raw_key: &Value) {
        if key != raw_key {
            self.track(raw_target, op, TrackKey::Entry(key.clone()));
        }
        self.track(raw_target, op, TrackKey::Entry(raw_key.clone()));
    }

    fn reject(&self, op: TriggerOp, key: Option<&Value>) {
        warn(ReactivityError::ReadonlyMutation {
            op,
            key: key.map(Value::describe).unwrap_or_default(),
        });
    }

    fn unsupported(&self, op: &'static str, kind: ContainerKind) {
        warn(ReactivityError::Unsupported { op, kind });
    }

    /// Resolve the stored form of `key`: as given if present, otherwise raw.
    fn resolve_key(&self, target: &Object, key: Value) -> (Value, bool) {
        let raw = target.raw();
        if raw.entry_has(&key) {
            self.check_identity_keys(target, &key);
            return (key, true);
        }
        let raw_key = to_raw(&key);
        let had = raw.entry_has(&raw_key);
        (raw_key, had)
    }

    fn check_identity_keys(&self, target: &Object, key: &Value) {
        let raw_key = to_raw(key);
        if raw_key != *key && target.raw().entry_has(&raw_key) {
            warn(ReactivityError::AliasedKeys { kind: target.kind() });
        }
    }

    /// Entries of the target, read through it when it is itself a wrapper.
    fn source(&self, target: &Object, method: IterMethod) -> Entries {
        match target.as_proxy() {
            Some(_) => target.iterate(method),
            None => target.iterate(IterMethod::Entries),
        }
    }
}

impl Handler for CollectionHandler {
    fn label(&self) -> &'static str {
        match (self.readonly, self.shallow) {
            (false, false) => "Reactive",
            (false, true) => "ShallowReactive",
            (true, _) => "Readonly",
        }
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn get(&self, _proxy: &Object, target: &Object, key: &Value) -> Value {
        let raw_target = to_raw(target);
        let raw_key = to_raw(key);
        self.track_key(&raw_target, TrackOp::Get, key, &raw_key);

        let raw = raw_target.raw();
        let found = if raw.entry_has(key) {
            target.get(key.clone())
        } else if raw.entry_has(&raw_key) {
            target.get(raw_key)
        } else {
            return Value::Undefined;
        };
        self.wrap().apply(found)
    }

    fn has(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        let raw_target = to_raw(target);
        let raw_key = to_raw(key);
        self.track_key(&raw_target, TrackOp::Has, key, &raw_key);

        if *key == raw_key {
            target.has(raw_key)
        } else {
            target.has(key.clone()) || target.has(raw_key)
        }
    }

    fn size(&self, _proxy: &Object, target: &Object) -> usize {
        self.track(&to_raw(target), TrackOp::Iterate, TrackKey::Iterate);
        target.size()
    }

    fn own_keys(&self, proxy: &Object, target: &Object) -> Vec<Value> {
        self.iterate(proxy, target, IterMethod::Keys)
            .map(|(key, _)| key)
            .collect()
    }

    fn add(&self, _proxy: &Object, target: &Object, value: Value) -> bool {
        if self.readonly {
            self.reject(TriggerOp::Add, Some(&value));
            return true;
        }

        let raw = target.raw();
        let value = to_raw(&value);
        match raw.entry_add(value.clone()) {
            Ok(true) => {
                trigger(
                    TargetRef::Object(target),
                    Change::new(TriggerOp::Add, Some(TrackKey::Entry(value.clone()))).with_new(value),
                );
                true
            }
            Ok(false) => true,
            Err(error) => {
                warn(error);
                false
            }
        }
    }

    fn set(&self, _proxy: &Object, target: &Object, key: Value, value: Value) -> bool {
        if self.readonly {
            self.reject(TriggerOp::Set, Some(&key));
            return true;
        }

        let raw = target.raw();
        if !matches!(raw.kind(), ContainerKind::Map | ContainerKind::WeakMap) {
            self.unsupported("set", raw.kind());
            return false;
        }

        let value = to_raw(&value);
        let (key, had) = self.resolve_key(target, key);
        let old = raw.entry_get(&key);
        if let Err(error) = raw.entry_set(key.clone(), value.clone()) {
            warn(error);
            return false;
        }

        if !had {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Add, Some(TrackKey::Entry(key))).with_new(value),
            );
        } else if has_changed(&value, &old) {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Set, Some(TrackKey::Entry(key)))
                    .with_new(value)
                    .with_old(old),
            );
        }
        true
    }

    fn delete(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        if self.readonly {
            self.reject(TriggerOp::Delete, Some(key));
            return false;
        }

        let raw = target.raw();
        let (key, had) = self.resolve_key(target, key.clone());
        let old = raw.entry_get(&key);
        let result = raw.entry_delete(&key);
        if had {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Delete, Some(TrackKey::Entry(key))).with_old(old),
            );
        }
        result
    }

    fn clear(&self, _proxy: &Object, target: &Object) {
        if self.readonly {
            self.reject(TriggerOp::Clear, None);
            return;
        }

        let raw = target.raw();
        if raw.kind().is_weak() {
            self.unsupported("clear", raw.kind());
            return;
        }
        let had_items = raw.entry_len() != 0;
        let old_target = Runtime::current()
            .config()
            .debug_hooks
            .then(|| Value::Object(raw.shallow_copy()));
        if let Err(error) = raw.entry_clear() {
            warn(error);
            return;
        }

        if had_items {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Clear, None).with_old_target(old_target),
            );
        }
    }

    fn for_each(&self, proxy: &Object, target: &Object, f: &mut dyn FnMut(Value, Value, &Object)) {
        if target.kind().is_weak() {
            self.unsupported("for_each", target.kind());
            return;
        }
        self.track(&to_raw(target), TrackOp::Iterate, TrackKey::Iterate);

        let wrap = self.wrap();
        for (key, value) in self.source(target, IterMethod::Entries) {
            f(wrap.apply(value), wrap.apply(key), proxy);
        }
    }

    fn iterate(&self, _proxy: &Object, target: &Object, method: IterMethod) -> Entries {
        let kind = target.kind();
        if kind.is_weak() {
            self.unsupported("iteration", kind);
            return Entries::empty();
        }

        let key = if method == IterMethod::Keys && kind == ContainerKind::Map {
            TrackKey::MapKeyIterate
        } else {
            TrackKey::Iterate
        };
        self.track(&to_raw(target), TrackOp::Iterate, key);

        Entries::new(Box::new(self.source(target, method)), self.wrap())
    }

    fn push(&self, _proxy: &Object, target: &Object, _values: Vec<Value>) -> usize {
        self.unsupported("push", target.kind());
        0
    }

    fn pop(&self, _proxy: &Object, target: &Object) -> Value {
        self.unsupported("pop", target.kind());
        Value::Undefined
    }

    fn shift(&self, _proxy: &Object, target: &Object) -> Value {
        self.unsupported("shift", target.kind());
        Value::Undefined
    }

    fn unshift(&self, _proxy: &Object, target: &Object, _values: Vec<Value>) -> usize {
        self.unsupported("unshift", target.kind());
        0
    }

    fn splice(
        &self,
        _proxy: &Object,
        target: &Object,
        _start: usize,
        _delete_count: usize,
        _items: Vec<Value>,
    ) -> Vec<Value> {
        self.unsupported("splice", target.kind());
        Vec::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_warnings;
    use crate::graph::DebuggerEvent;
    use crate::object::{is_reactive, is_readonly, reactive, readonly, shallow_reactive};
    use crate::reactive::{effect, Effect, EffectOptions, RuntimeConfig};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counting_effect(f: impl Fn() -> Value + 'static) -> (Effect, Rc<Cell<i32>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let runner = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                f()
            },
            EffectOptions::default(),
        );
        (runner, runs)
    }

    #[test]
    fn set_add_is_deduplicated() {
        let set = reactive(Object::new_set());
        let set_clone = set.clone();
        let (_runner, runs) = counting_effect(move || Value::from(set_clone.size()));

        set.add(1);
        assert_eq!(runs.get(), 2);
        set.add(1);
        assert_eq!(runs.get(), 2);
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn map_values_are_wrapped_on_read() {
        let inner = Object::record();
        let map = reactive(Object::map_from([("k", inner.clone())]));

        let read = map.get("k");
        assert!(is_reactive(&read));
        assert!(to_raw(&read).as_object().is_some_and(|o| o.ptr_eq(&inner)));

        let view = readonly(Object::map_from([("k", inner)]));
        assert!(is_readonly(&view.get("k")));
    }

    #[test]
    fn shallow_maps_return_raw_values() {
        let inner = Object::record();
        let map = shallow_reactive(Object::map_from([("k", inner.clone())]));
        assert_eq!(map.get("k"), Value::from(&inner));
    }

    #[test]
    fn reactive_keys_find_raw_entries() {
        let key = Object::record();
        let map = reactive(Object::map());
        map.set(key.clone(), 1);

        let wrapped_key = reactive(key.clone());
        assert_eq!(map.get(wrapped_key.clone()), 1);
        assert!(map.has(wrapped_key));
    }

    #[test]
    fn writes_through_either_key_form_notify() {
        let key = Object::record();
        let map = reactive(Object::map_from([(key.clone(), 1)]));
        let map_clone = map.clone();
        let wrapped_key = reactive(key.clone());
        let (_runner, runs) = counting_effect(move || map_clone.get(wrapped_key.clone()));

        map.set(key, 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn aliased_keys_warn() {
        Runtime::install(RuntimeConfig::development());
        let key = Object::record();
        let wrapped_key = reactive(key.clone());
        let raw_map = Object::map_from([(Value::from(&key), 1), (Value::from(&wrapped_key), 2)]);
        let map = reactive(raw_map);

        map.set(wrapped_key, 3);
        assert_eq!(
            take_warnings(),
            vec![ReactivityError::AliasedKeys { kind: ContainerKind::Map }]
        );
    }

    #[test]
    fn keys_ignore_value_updates() {
        let map = reactive(Object::map_from([("a", 1)]));
        let map_clone = map.clone();
        let (_keys, key_runs) = counting_effect(move || Value::from(map_clone.keys().count()));
        let map_clone = map.clone();
        let (_values, value_runs) = counting_effect(move || Value::from(map_clone.values().count()));

        map.set("a", 2);
        assert_eq!(key_runs.get(), 1);
        assert_eq!(value_runs.get(), 2);

        map.set("b", 1);
        assert_eq!(key_runs.get(), 2);
        assert_eq!(value_runs.get(), 3);
    }

    #[test]
    fn delete_only_notifies_existing_entries() {
        let map = reactive(Object::map_from([("a", 1)]));
        let map_clone = map.clone();
        let (_runner, runs) = counting_effect(move || Value::from(map_clone.size()));

        assert!(!map.delete("missing"));
        assert_eq!(runs.get(), 1);
        assert!(map.delete("a"));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn clear_passes_old_contents() {
        Runtime::install(RuntimeConfig::development());
        let set = reactive(Object::set_from([1, 2]));
        let seen: Rc<RefCell<Vec<DebuggerEvent>>> = Rc::default();
        let seen_clone = seen.clone();

        let set_clone = set.clone();
        let _runner = effect(
            move || set_clone.size(),
            EffectOptions::new().on_trigger(move |event| seen_clone.borrow_mut().push(event.clone())),
        );

        set.clear();
        set.clear();

        let events = seen.borrow();
        assert_eq!(events.len(), 1);
        let old = events[0].old_target.as_ref().and_then(Value::as_object).map(Object::size);
        assert_eq!(old, Some(2));
    }

    #[test]
    fn for_each_wraps_and_passes_the_wrapper() {
        let item = Object::record();
        let map = reactive(Object::map_from([(item.clone(), item.clone())]));
        let mut calls = 0;
        map.for_each(|value, key, container| {
            calls += 1;
            assert!(is_reactive(&value));
            assert!(is_reactive(&key));
            assert_eq!(*container, map);
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn readonly_mutations_are_neutral() {
        Runtime::install(RuntimeConfig::development());
        let view = readonly(Object::set_from([1]));

        assert!(view.add(2));
        assert!(!view.delete(1));
        view.clear();
        assert_eq!(view.size(), 1);
        assert_eq!(take_warnings().len(), 3);
    }

    #[test]
    fn weak_collections_require_object_keys() {
        Runtime::install(RuntimeConfig::development());
        let weak = reactive(Object::weak_map());

        assert!(!weak.set("a", 1));
        let key = Object::record();
        assert!(weak.set(key.clone(), 1));
        assert_eq!(weak.get(key), 1);
        assert_eq!(weak.keys().count(), 0);
        assert_eq!(take_warnings().len(), 2);
    }
}
