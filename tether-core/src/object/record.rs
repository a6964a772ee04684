//! Handlers for records and arrays.
//!
//! # Reads
//!
//! A read resolves the key to a [`Slot`], reads through the target and then:
//!
//! - records a `get` dependency (mutable flavours only)
//! - returns the value untouched for shallow flavours
//! - unwraps a ref, except for array elements
//! - wraps a nested object on the way out, read-only if this wrapper is
//!
//! # Writes
//!
//! Mutable writes operate on the raw target and notify with `add` for a new
//! slot or `set` for a changed one. A ref stored in a record slot absorbs a
//! plain write in place. Read-only wrappers report the attempt and report
//! success without changing anything.
//!
//! # Array methods
//!
//! Searches record a dependency on every index. Mutators run with tracking
//! paused and replay every element move through this handler's `set` and
//! `delete`, so the usual slot and length notifications fire.

use super::handler::{Flavor, Handler};
use super::observe::{reactive, readonly, to_raw};
use super::{last_position, position, Entries, IterMethod, Object, Slot};
use crate::error::{warn, ReactivityError};
use crate::graph::{track, trigger, Change, TargetRef, TrackKey, TrackOp, TriggerOp};
use crate::object::ContainerKind;
use crate::reactive::TrackingPause;
use crate::value::{has_changed, Value};

pub(crate) struct BaseHandler {
    readonly: bool,
    shallow: bool,
}

static MUTABLE_HANDLER: BaseHandler = BaseHandler {
    readonly: false,
    shallow: false,
};
static SHALLOW_REACTIVE_HANDLER: BaseHandler = BaseHandler {
    readonly: false,
    shallow: true,
};
static READONLY_HANDLER: BaseHandler = BaseHandler {
    readonly: true,
    shallow: false,
};
static SHALLOW_READONLY_HANDLER: BaseHandler = BaseHandler {
    readonly: true,
    shallow: true,
};

pub(crate) fn handler_for(flavor: Flavor) -> &'static dyn Handler {
    match flavor {
        Flavor::Reactive => &MUTABLE_HANDLER,
        Flavor::ShallowReactive => &SHALLOW_REACTIVE_HANDLER,
        Flavor::Readonly => &READONLY_HANDLER,
        Flavor::ShallowReadonly => &SHALLOW_READONLY_HANDLER,
    }
}

impl BaseHandler {
    fn reject(&self, op: TriggerOp, key: &Value) {
        warn(ReactivityError::ReadonlyMutation {
            op,
            key: key.describe(),
        });
    }

    fn track_search(&self, target: &Object, len: usize) {
        for index in 0..len {
            track(TargetRef::Object(target), TrackOp::Get, TrackKey::Index(index));
        }
    }

    /// Run a search either natively over this wrapper (read-only) or over
    /// the raw array after tracking every index (mutable).
    fn search(
        &self,
        proxy: &Object,
        target: &Object,
        needle: &Value,
        find: impl Fn(&[Value], &Value) -> Option<usize>,
    ) -> Option<usize> {
        let len = target.raw().array_len();
        if self.readonly {
            let items: Vec<Value> = (0..len)
                .map(|index| self.get(proxy, target, &Value::from(index)))
                .collect();
            return find(&items, needle);
        }

        self.track_search(target, len);
        let items = target.raw().array_items();
        find(&items, needle).or_else(|| find(&items, &to_raw(needle)))
    }

    /// Move the element at `from` to `to`, or clear `to` when `from` is
    /// missing.
    fn move_element(&self, proxy: &Object, target: &Object, from: usize, to: usize) {
        let raw = target.raw();
        let from = Slot::Index(from);
        if raw.has_slot(&from) {
            self.set(proxy, target, Value::from(to), raw.get_slot(&from));
        } else {
            self.delete(proxy, target, &Value::from(to));
        }
    }

    fn set_length(&self, proxy: &Object, target: &Object, len: usize) {
        self.set(proxy, target, Value::from("length"), Value::from(len));
    }
}

impl Handler for BaseHandler {
    fn label(&self) -> &'static str {
        match (self.readonly, self.shallow) {
            (false, false) => "Reactive",
            (false, true) => "ShallowReactive",
            (true, false) => "Readonly",
            (true, true) => "ShallowReadonly",
        }
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn get(&self, _proxy: &Object, target: &Object, key: &Value) -> Value {
        let kind = target.kind();
        let Some(slot) = Slot::for_key(kind, key) else {
            return Value::Undefined;
        };
        let result = target.get(key.clone());
        if !slot.is_trackable() {
            return result;
        }

        if !self.readonly {
            track(TargetRef::Object(target), TrackOp::Get, slot.track_key());
        }
        if self.shallow {
            return result;
        }

        match result {
            Value::Ref(r) if !(kind == ContainerKind::Array && slot.is_index()) => r.get(),
            Value::Object(object) if self.readonly => Value::Object(readonly(object)),
            Value::Object(object) => Value::Object(reactive(object)),
            other => other,
        }
    }

    fn set(&self, _proxy: &Object, target: &Object, key: Value, value: Value) -> bool {
        if self.readonly {
            self.reject(TriggerOp::Set, &key);
            return true;
        }

        let raw = target.raw();
        let kind = raw.kind();
        let Some(slot) = Slot::for_key(kind, &key) else {
            warn(ReactivityError::Unsupported { op: "set", kind });
            return false;
        };
        let old = raw.get_slot(&slot);

        let value = if self.shallow {
            value
        } else {
            let value = to_raw(&value);
            if kind != ContainerKind::Array && !value.is_ref() {
                if let Value::Ref(old_ref) = &old {
                    old_ref.set(value);
                    return true;
                }
            }
            value
        };

        let had_slot = raw.has_slot(&slot);
        if !raw.set_slot(&slot, value.clone()) {
            return false;
        }

        let key = slot.track_key();
        if !had_slot {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Add, Some(key)).with_new(value),
            );
        } else if has_changed(&value, &old) {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Set, Some(key))
                    .with_new(value)
                    .with_old(old),
            );
        }
        true
    }

    fn has(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        let Some(slot) = Slot::for_key(target.kind(), key) else {
            return false;
        };
        let result = target.has(key.clone());
        if !self.readonly && slot.is_trackable() {
            track(TargetRef::Object(target), TrackOp::Has, slot.track_key());
        }
        result
    }

    fn delete(&self, _proxy: &Object, target: &Object, key: &Value) -> bool {
        if self.readonly {
            self.reject(TriggerOp::Delete, key);
            return true;
        }

        let raw = target.raw();
        let Some(slot) = Slot::for_key(raw.kind(), key) else {
            return true;
        };
        let had_slot = raw.has_slot(&slot);
        let old = raw.get_slot(&slot);
        let result = raw.delete_slot(&slot);
        if result && had_slot {
            trigger(
                TargetRef::Object(target),
                Change::new(TriggerOp::Delete, Some(slot.track_key())).with_old(old),
            );
        }
        result
    }

    fn own_keys(&self, _proxy: &Object, target: &Object) -> Vec<Value> {
        if !self.readonly {
            let key = if target.kind() == ContainerKind::Array {
                TrackKey::Length
            } else {
                TrackKey::Iterate
            };
            track(TargetRef::Object(target), TrackOp::Iterate, key);
        }
        target.own_keys()
    }

    fn size(&self, _proxy: &Object, target: &Object) -> usize {
        warn(ReactivityError::Unsupported {
            op: "size",
            kind: target.kind(),
        });
        0
    }

    fn add(&self, _proxy: &Object, target: &Object, _value: Value) -> bool {
        warn(ReactivityError::Unsupported {
            op: "add",
            kind: target.kind(),
        });
        false
    }

    fn clear(&self, _proxy: &Object, target: &Object) {
        warn(ReactivityError::Unsupported {
            op: "clear",
            kind: target.kind(),
        });
    }

    fn for_each(&self, _proxy: &Object, target: &Object, _f: &mut dyn FnMut(Value, Value, &Object)) {
        warn(ReactivityError::Unsupported {
            op: "for_each",
            kind: target.kind(),
        });
    }

    fn iterate(&self, _proxy: &Object, target: &Object, _method: IterMethod) -> Entries {
        warn(ReactivityError::Unsupported {
            op: "iteration",
            kind: target.kind(),
        });
        Entries::empty()
    }

    fn push(&self, proxy: &Object, target: &Object, values: Vec<Value>) -> usize {
        let mut len = target.raw().array_len();
        if self.readonly {
            self.reject(TriggerOp::Add, &Value::from(len));
            return len;
        }

        let _pause = TrackingPause::new();
        for value in values {
            self.set(proxy, target, Value::from(len), value);
            len += 1;
        }
        self.set_length(proxy, target, len);
        len
    }

    fn pop(&self, proxy: &Object, target: &Object) -> Value {
        let len = target.raw().array_len();
        if self.readonly {
            self.reject(TriggerOp::Delete, &Value::from(len.saturating_sub(1)));
            return Value::Undefined;
        }

        let _pause = TrackingPause::new();
        if len == 0 {
            self.set_length(proxy, target, 0);
            return Value::Undefined;
        }
        let last = self.get(proxy, target, &Value::from(len - 1));
        self.delete(proxy, target, &Value::from(len - 1));
        self.set_length(proxy, target, len - 1);
        last
    }

    fn shift(&self, proxy: &Object, target: &Object) -> Value {
        let len = target.raw().array_len();
        if self.readonly {
            self.reject(TriggerOp::Delete, &Value::from(0));
            return Value::Undefined;
        }

        let _pause = TrackingPause::new();
        if len == 0 {
            self.set_length(proxy, target, 0);
            return Value::Undefined;
        }
        let first = self.get(proxy, target, &Value::from(0));
        for index in 1..len {
            self.move_element(proxy, target, index, index - 1);
        }
        self.delete(proxy, target, &Value::from(len - 1));
        self.set_length(proxy, target, len - 1);
        first
    }

    fn unshift(&self, proxy: &Object, target: &Object, values: Vec<Value>) -> usize {
        let len = target.raw().array_len();
        if self.readonly {
            self.reject(TriggerOp::Add, &Value::from(0));
            return len;
        }

        let _pause = TrackingPause::new();
        let count = values.len();
        if count > 0 {
            for index in (0..len).rev() {
                self.move_element(proxy, target, index, index + count);
            }
            for (offset, value) in values.into_iter().enumerate() {
                self.set(proxy, target, Value::from(offset), value);
            }
        }
        self.set_length(proxy, target, len + count);
        len + count
    }

    fn splice(
        &self,
        proxy: &Object,
        target: &Object,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let len = target.raw().array_len();
        if self.readonly {
            self.reject(TriggerOp::Set, &Value::from(start.min(len)));
            return Vec::new();
        }

        let _pause = TrackingPause::new();
        let start = start.min(len);
        let delete_count = delete_count.min(len - start);
        let item_count = items.len();

        let removed = (start..start + delete_count)
            .map(|index| self.get(proxy, target, &Value::from(index)))
            .collect();

        if item_count < delete_count {
            for index in start..len - delete_count {
                self.move_element(proxy, target, index + delete_count, index + item_count);
            }
            for index in (len - delete_count + item_count..len).rev() {
                self.delete(proxy, target, &Value::from(index));
            }
        } else if item_count > delete_count {
            for index in (start..len - delete_count).rev() {
                self.move_element(proxy, target, index + delete_count, index + item_count);
            }
        }
        for (offset, item) in items.into_iter().enumerate() {
            self.set(proxy, target, Value::from(start + offset), item);
        }
        self.set_length(proxy, target, len - delete_count + item_count);
        removed
    }

    fn includes(&self, proxy: &Object, target: &Object, needle: &Value) -> bool {
        let contains = |items: &[Value], needle: &Value| items.iter().position(|item| item == needle);
        self.search(proxy, target, needle, contains).is_some()
    }

    fn index_of(&self, proxy: &Object, target: &Object, needle: &Value) -> Option<usize> {
        self.search(proxy, target, needle, position)
    }

    fn last_index_of(&self, proxy: &Object, target: &Object, needle: &Value) -> Option<usize> {
        self.search(proxy, target, needle, last_position)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
