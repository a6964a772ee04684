//! The capability interface of wrappers.
//!
//! Every wrapper carries a `&'static dyn Handler`. Each method receives the
//! wrapper itself (`proxy`) and the object it wraps (`target`), which may be
//! a raw container or another wrapper. The default implementations forward
//! to `target` untouched, so a handler only overrides the operations it
//! actually intercepts.

use super::observe::{reactive, readonly};
use super::{Entries, IterMethod, Object};
use crate::value::Value;

/// The four wrapper flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Flavor {
    pub(crate) fn is_readonly(self) -> bool {
        matches!(self, Flavor::Readonly | Flavor::ShallowReadonly)
    }
}

/// How values read out of a container are wrapped before they are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wrap {
    Raw,
    Reactive,
    Readonly,
}

impl Wrap {
    pub(crate) fn for_mode(readonly: bool, shallow: bool) -> Self {
        match (readonly, shallow) {
            (true, _) => Wrap::Readonly,
            (false, true) => Wrap::Raw,
            (false, false) => Wrap::Reactive,
        }
    }

    pub(crate) fn apply(self, value: Value) -> Value {
        match (self, value) {
            (Wrap::Reactive, Value::Object(object)) => Value::Object(reactive(object)),
            (Wrap::Readonly, Value::Object(object)) => Value::Object(readonly(object)),
            (_, value) => value,
        }
    }
}

pub(crate) trait Handler {
    fn label(&self) -> &'static str;

    fn is_readonly(&self) -> bool;

    fn is_shallow(&self) -> bool;

    /// Reported by `is_reactive`.
    fn reactive_flag(&self) -> bool {
        !self.is_readonly()
    }

    /// Whether `to_raw` sees through this wrapper.
    fn exposes_raw(&self) -> bool {
        true
    }

    fn get(&self, _proxy: &Object, target: &Object, key: &Value) -> Value {
        target.get(key.clone())
    }

    fn set(&self, _proxy: &Object, target: &Object, key: Value, value: Value) -> bool {
        target.set(key, value)
    }

    fn has(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        target.has(key.clone())
    }

    fn delete(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        target.delete(key.clone())
    }

    fn own_keys(&self, _proxy: &Object, target: &Object) -> Vec<Value> {
        target.own_keys()
    }

    fn size(&self, _proxy: &Object, target: &Object) -> usize {
        target.size()
    }

    fn add(&self, _proxy: &Object, target: &Object, value: Value) -> bool {
        target.add(value)
    }

    fn clear(&self, _proxy: &Object, target: &Object) {
        target.clear()
    }

    fn for_each(&self, _proxy: &Object, target: &Object, f: &mut dyn FnMut(Value, Value, &Object)) {
        target.for_each(f)
    }

    fn iterate(&self, _proxy: &Object, target: &Object, method: IterMethod) -> Entries {
        target.iterate(method)
    }

    fn push(&self, _proxy: &Object, target: &Object, values: Vec<Value>) -> usize {
        target.push_all(values)
    }

    fn pop(&self, _proxy: &Object, target: &Object) -> Value {
        target.pop()
    }

    fn shift(&self, _proxy: &Object, target: &Object) -> Value {
        target.shift()
    }

    fn unshift(&self, _proxy: &Object, target: &Object, values: Vec<Value>) -> usize {
        target.unshift(values)
    }

    fn splice(
        &self,
        _proxy: &Object,
        target: &Object,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        target.splice(start, delete_count, items)
    }

    fn includes(&self, _proxy: &Object, target: &Object, needle: &Value) -> bool {
        target.includes(needle.clone())
    }

    fn index_of(&self, _proxy: &Object, target: &Object, needle: &Value) -> Option<usize> {
        target.index_of(needle.clone())
    }

    fn last_index_of(&self, _proxy: &Object, target: &Object, needle: &Value) -> Option<usize> {
        target.last_index_of(needle.clone())
    }
}
