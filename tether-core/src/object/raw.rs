//! Raw container storage.
//!
//! A [`RawObject`] is the unobserved data behind every [`Object`]. It never
//! tracks or triggers anything itself; the handlers in this module's siblings
//! decide when to consult the dependency graph around a raw access.
//!
//! Record-like containers are addressed by [`Slot`], associative containers
//! by entry key. Arrays have no holes: deleting an element leaves
//! `Undefined` in its place, and an element exists exactly when its index is
//! below the length.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::Object;
use crate::error::{warn, ReactivityError};
use crate::graph::{DepsMap, TrackKey};
use crate::value::Value;

/// Property names that are never tracked.
const NON_TRACKABLE_KEYS: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

/// The shape of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Record,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
    /// A value that can be stored and compared but never observed.
    Opaque,
}

impl ContainerKind {
    /// Maps and sets (weak or not).
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            ContainerKind::Map | ContainerKind::Set | ContainerKind::WeakMap | ContainerKind::WeakSet
        )
    }

    pub fn is_weak(self) -> bool {
        matches!(self, ContainerKind::WeakMap | ContainerKind::WeakSet)
    }

    /// Whether wrappers can be created for this kind at all.
    pub fn is_observable(self) -> bool {
        self != ContainerKind::Opaque
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Record => "record",
            ContainerKind::Array => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
            ContainerKind::WeakMap => "weak map",
            ContainerKind::WeakSet => "weak set",
            ContainerKind::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable slot of a record or array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Prop(Rc<str>),
    Index(usize),
    Length,
}

impl Slot {
    /// Resolve `key` against a container of `kind`.
    ///
    /// Arrays only address canonical indices and `length`. Object keys never
    /// address a record slot. Collections have no slots.
    pub(crate) fn for_key(kind: ContainerKind, key: &Value) -> Option<Slot> {
        match kind {
            ContainerKind::Record => key.property_name().map(Slot::Prop),
            ContainerKind::Array => match key {
                Value::Str(s) if &**s == "length" => Some(Slot::Length),
                _ => key.as_index().map(Slot::Index),
            },
            _ => None,
        }
    }

    pub(crate) fn track_key(&self) -> TrackKey {
        match self {
            Slot::Prop(name) => TrackKey::Prop(name.clone()),
            Slot::Index(index) => TrackKey::Index(*index),
            Slot::Length => TrackKey::Length,
        }
    }

    pub(crate) fn is_trackable(&self) -> bool {
        match self {
            Slot::Prop(name) => !NON_TRACKABLE_KEYS.contains(&&**name),
            _ => true,
        }
    }

    pub(crate) fn is_index(&self) -> bool {
        matches!(self, Slot::Index(_))
    }

    pub(crate) fn key(&self) -> Value {
        match self {
            Slot::Prop(name) => Value::Str(name.clone()),
            Slot::Index(index) => Value::from(*index),
            Slot::Length => Value::from("length"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum RawData {
    Record(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map { entries: IndexMap<Value, Value>, weak: bool },
    Set { items: IndexSet<Value>, weak: bool },
    Opaque(Rc<str>),
}

impl RawData {
    fn kind(&self) -> ContainerKind {
        match self {
            RawData::Record(_) => ContainerKind::Record,
            RawData::Array(_) => ContainerKind::Array,
            RawData::Map { weak: false, .. } => ContainerKind::Map,
            RawData::Map { weak: true, .. } => ContainerKind::WeakMap,
            RawData::Set { weak: false, .. } => ContainerKind::Set,
            RawData::Set { weak: true, .. } => ContainerKind::WeakSet,
            RawData::Opaque(_) => ContainerKind::Opaque,
        }
    }
}

/// Unobserved container data plus the dependency key-map that describes it.
pub(crate) struct RawObject {
    data: RefCell<RawData>,
    kind: ContainerKind,
    deps: DepsMap,
    skip: Cell<bool>,
    extensible: Cell<bool>,
}

impl RawObject {
    pub(crate) fn new(data: RawData) -> Self {
        Self {
            kind: data.kind(),
            data: RefCell::new(data),
            deps: DepsMap::default(),
            skip: Cell::new(false),
            extensible: Cell::new(true),
        }
    }

    pub(crate) fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub(crate) fn deps(&self) -> &DepsMap {
        &self.deps
    }

    pub(crate) fn is_skipped(&self) -> bool {
        self.skip.get()
    }

    pub(crate) fn mark_skip(&self) {
        self.skip.set(true);
    }

    pub(crate) fn is_extensible(&self) -> bool {
        self.extensible.get()
    }

    pub(crate) fn prevent_extensions(&self) {
        self.extensible.set(false);
    }

    fn unsupported(&self, op: &'static str) -> ReactivityError {
        ReactivityError::Unsupported {
            op,
            kind: self.kind,
        }
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    pub(crate) fn get_slot(&self, slot: &Slot) -> Value {
        match (&*self.data.borrow(), slot) {
            (RawData::Record(props), Slot::Prop(name)) => props.get(name).cloned().unwrap_or_default(),
            (RawData::Array(items), Slot::Index(index)) => items.get(*index).cloned().unwrap_or_default(),
            (RawData::Array(items), Slot::Length) => Value::from(items.len()),
            _ => Value::Undefined,
        }
    }

    pub(crate) fn has_slot(&self, slot: &Slot) -> bool {
        match (&*self.data.borrow(), slot) {
            (RawData::Record(props), Slot::Prop(name)) => props.contains_key(name),
            (RawData::Array(items), Slot::Index(index)) => *index < items.len(),
            (RawData::Array(_), Slot::Length) => true,
            _ => false,
        }
    }

    /// Write a slot. Fails when adding to a non-extensible container or when
    /// `length` receives something that is not a valid length.
    pub(crate) fn set_slot(&self, slot: &Slot, value: Value) -> bool {
        let extensible = self.is_extensible();
        match (&mut *self.data.borrow_mut(), slot) {
            (RawData::Record(props), Slot::Prop(name)) => match props.get_mut(name) {
                Some(existing) => {
                    *existing = value;
                    true
                }
                None if extensible => {
                    props.insert(name.clone(), value);
                    true
                }
                None => false,
            },
            (RawData::Array(items), Slot::Index(index)) => {
                if let Some(existing) = items.get_mut(*index) {
                    *existing = value;
                    true
                } else if extensible && reserve_to(items, *index + 1) {
                    items.resize(*index, Value::Undefined);
                    items.push(value);
                    true
                } else {
                    false
                }
            }
            (RawData::Array(items), Slot::Length) => match value.as_length() {
                Some(length) if length <= items.len() => {
                    items.truncate(length);
                    true
                }
                Some(length) if extensible && reserve_to(items, length) => {
                    items.resize(length, Value::Undefined);
                    true
                }
                Some(_) => false,
                None => {
                    warn(ReactivityError::Unsupported {
                        op: "invalid length",
                        kind: ContainerKind::Array,
                    });
                    false
                }
            },
            _ => false,
        }
    }

    /// Remove a slot. Array elements become `Undefined`; `length` cannot be
    /// deleted.
    pub(crate) fn delete_slot(&self, slot: &Slot) -> bool {
        match (&mut *self.data.borrow_mut(), slot) {
            (RawData::Record(props), Slot::Prop(name)) => {
                props.shift_remove(name);
                true
            }
            (RawData::Array(items), Slot::Index(index)) => {
                if let Some(existing) = items.get_mut(*index) {
                    *existing = Value::Undefined;
                }
                true
            }
            (RawData::Array(_), Slot::Length) => false,
            _ => true,
        }
    }

    fn slot_keys(&self) -> Vec<Value> {
        match &*self.data.borrow() {
            RawData::Record(props) => props.keys().map(|name| Value::Str(name.clone())).collect(),
            RawData::Array(items) => (0..items.len()).map(Value::from).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn array_len(&self) -> usize {
        match &*self.data.borrow() {
            RawData::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub(crate) fn array_items(&self) -> Vec<Value> {
        match &*self.data.borrow() {
            RawData::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Splice the raw array in place, returning the removed elements.
    pub(crate) fn array_splice(
        &self,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, ReactivityError> {
        let extensible = self.is_extensible();
        match &mut *self.data.borrow_mut() {
            RawData::Array(array) => {
                let start = start.min(array.len());
                let end = start + delete_count.min(array.len() - start);
                if !extensible && items.len() > end - start {
                    return Err(self.unsupported("growing a frozen array"));
                }
                Ok(array.splice(start..end, items).collect())
            }
            _ => Err(self.unsupported("splice")),
        }
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    fn check_weak_key(&self, key: &Value) -> Result<(), ReactivityError> {
        if self.kind.is_weak() && !matches!(key, Value::Object(_) | Value::Ref(_)) {
            return Err(ReactivityError::InvalidWeakKey {
                kind: self.kind,
                value: key.describe(),
            });
        }
        Ok(())
    }

    pub(crate) fn entry_has(&self, key: &Value) -> bool {
        match &*self.data.borrow() {
            RawData::Map { entries, .. } => entries.contains_key(key),
            RawData::Set { items, .. } => items.contains(key),
            _ => false,
        }
    }

    pub(crate) fn entry_get(&self, key: &Value) -> Value {
        match &*self.data.borrow() {
            RawData::Map { entries, .. } => entries.get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    pub(crate) fn entry_set(&self, key: Value, value: Value) -> Result<(), ReactivityError> {
        self.check_weak_key(&key)?;
        let extensible = self.is_extensible();
        match &mut *self.data.borrow_mut() {
            RawData::Map { entries, .. } => {
                if !extensible && !entries.contains_key(&key) {
                    return Err(self.unsupported("adding to a frozen map"));
                }
                entries.insert(key, value);
                Ok(())
            }
            _ => Err(self.unsupported("set")),
        }
    }

    /// Insert into a set. Returns whether the value was new.
    pub(crate) fn entry_add(&self, value: Value) -> Result<bool, ReactivityError> {
        self.check_weak_key(&value)?;
        let extensible = self.is_extensible();
        match &mut *self.data.borrow_mut() {
            RawData::Set { items, .. } => {
                if !extensible && !items.contains(&value) {
                    return Err(self.unsupported("adding to a frozen set"));
                }
                Ok(items.insert(value))
            }
            _ => Err(self.unsupported("add")),
        }
    }

    pub(crate) fn entry_delete(&self, key: &Value) -> bool {
        match &mut *self.data.borrow_mut() {
            RawData::Map { entries, .. } => entries.shift_remove(key).is_some(),
            RawData::Set { items, .. } => items.shift_remove(key),
            _ => false,
        }
    }

    pub(crate) fn entry_clear(&self) -> Result<(), ReactivityError> {
        match &mut *self.data.borrow_mut() {
            RawData::Map { entries, .. } => entries.clear(),
            RawData::Set { items, .. } => items.clear(),
            _ => return Err(self.unsupported("clear")),
        }
        Ok(())
    }

    pub(crate) fn entry_len(&self) -> usize {
        match &*self.data.borrow() {
            RawData::Map { entries, .. } => entries.len(),
            RawData::Set { items, .. } => items.len(),
            _ => 0,
        }
    }

    /// `(key, value)` pairs; a set reports each item as both.
    pub(crate) fn entry_pairs(&self) -> Result<Vec<(Value, Value)>, ReactivityError> {
        if self.kind.is_weak() {
            return Err(self.unsupported("iteration"));
        }
        match &*self.data.borrow() {
            RawData::Map { entries, .. } => Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            RawData::Set { items, .. } => Ok(items.iter().map(|v| (v.clone(), v.clone())).collect()),
            _ => Err(self.unsupported("iteration")),
        }
    }

    // ------------------------------------------------------------------
    // Generic access
    // ------------------------------------------------------------------

    pub(crate) fn get(&self, key: &Value) -> Value {
        if self.kind.is_collection() {
            return self.entry_get(key);
        }
        Slot::for_key(self.kind, key)
            .map(|slot| self.get_slot(&slot))
            .unwrap_or_default()
    }

    pub(crate) fn has(&self, key: &Value) -> bool {
        if self.kind.is_collection() {
            return self.entry_has(key);
        }
        Slot::for_key(self.kind, key).is_some_and(|slot| self.has_slot(&slot))
    }

    pub(crate) fn set(&self, key: Value, value: Value) -> Result<bool, ReactivityError> {
        if self.kind.is_collection() {
            return self.entry_set(key, value).map(|_| true);
        }
        match Slot::for_key(self.kind, &key) {
            Some(slot) => Ok(self.set_slot(&slot, value)),
            None => Err(self.unsupported("set")),
        }
    }

    pub(crate) fn delete(&self, key: &Value) -> bool {
        if self.kind.is_collection() {
            return self.entry_delete(key);
        }
        Slot::for_key(self.kind, key).map_or(true, |slot| self.delete_slot(&slot))
    }

    pub(crate) fn own_keys(&self) -> Vec<Value> {
        if self.kind.is_collection() {
            return self
                .entry_pairs()
                .map(|pairs| pairs.into_iter().map(|(k, _)| k).collect())
                .unwrap_or_default();
        }
        self.slot_keys()
    }

    /// A new, unobserved container holding the same values.
    pub(crate) fn shallow_copy(&self) -> Object {
        Object::from_data(self.data.borrow().clone())
    }

    pub(crate) fn snapshot(&self, render: impl Fn(&Value) -> serde_json::Value) -> serde_json::Value {
        use serde_json::Value as Json;

        match &*self.data.borrow() {
            RawData::Record(props) => Json::Object(
                props
                    .iter()
                    .map(|(name, value)| (name.to_string(), render(value)))
                    .collect(),
            ),
            RawData::Array(items) => Json::Array(items.iter().map(&render).collect()),
            RawData::Map { entries, .. } => Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![render(k), render(v)]))
                    .collect(),
            ),
            RawData::Set { items, .. } => Json::Array(items.iter().map(&render).collect()),
            RawData::Opaque(type_name) => Json::String(format!("[{type_name}]")),
        }
    }

    pub(crate) fn opaque_name(&self) -> Option<Rc<str>> {
        match &*self.data.borrow() {
            RawData::Opaque(name) => Some(name.clone()),
            _ => None,
        }
    }
}

/// Make room for `length` elements, reporting instead of aborting when the
/// allocation fails.
fn reserve_to(items: &mut Vec<Value>, length: usize) -> bool {
    let additional = length.saturating_sub(items.len());
    if items.try_reserve(additional).is_ok() {
        return true;
    }
    warn(ReactivityError::Unsupported {
        op: "oversized resize",
        kind: ContainerKind::Array,
    });
    false
}
