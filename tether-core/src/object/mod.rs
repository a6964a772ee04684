//! Observable Containers
//!
//! An [`Object`] is a shared handle to either a raw container or a wrapper
//! (proxy) around another object. Every operation on a wrapper is routed
//! through the wrapper's [`Handler`], which consults the dependency graph
//! around the underlying raw access:
//!
//! - reads record which keys the running effect depends on
//! - writes notify the effects that depend on the keys they change
//!
//! Operations on a raw container go straight to its data and are never
//! observed.
//!
//! # Kinds
//!
//! Records and arrays are *record-like*: they are addressed by property name
//! or index through [`get`](Object::get) / [`set`](Object::set). Maps, sets
//! and their weak variants are *associative*: they additionally expose
//! [`size`](Object::size), [`add`](Object::add), [`clear`](Object::clear) and
//! iteration. Opaque objects can be stored anywhere but are never wrapped.
//!
//! # Identity
//!
//! Objects compare by identity. Wrapping is canonical per family, so
//! `reactive(x) == reactive(x)`, while the wrapper is never equal to the raw
//! container it wraps.

mod collection;
mod handler;
mod observe;
mod raw;
mod record;
mod unwrap;

use std::fmt;
use std::iter;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

pub use observe::{
    is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, Observable,
};
pub use raw::ContainerKind;

pub(crate) use handler::{Handler, Wrap};
pub(crate) use observe::to_reactive;
pub(crate) use raw::{RawData, RawObject, Slot};
pub(crate) use unwrap::REF_UNWRAP_HANDLER;

use crate::error::{warn, ReactivityError};
use crate::value::Value;

pub(crate) enum ObjectInner {
    Raw(RawObject),
    Proxy(Proxy),
}

pub(crate) struct Proxy {
    pub(crate) target: Object,
    pub(crate) handler: &'static dyn Handler,
}

pub(crate) type WeakObject = Weak<ObjectInner>;

/// Shared handle to a container or a wrapper around one.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

/// Which projection of an associative container to iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterMethod {
    Keys,
    Values,
    Entries,
}

fn warn_or<T>(result: Result<T, ReactivityError>, neutral: T) -> T {
    result.unwrap_or_else(|error| {
        warn(error);
        neutral
    })
}

impl Object {
    pub(crate) fn from_data(data: RawData) -> Self {
        Object(Rc::new(ObjectInner::Raw(RawObject::new(data))))
    }

    pub(crate) fn new_proxy(target: Object, handler: &'static dyn Handler) -> Self {
        Object(Rc::new(ObjectInner::Proxy(Proxy { target, handler })))
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::from_data(RawData::Record(IndexMap::new()))
    }

    pub fn record_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::from_data(RawData::Record(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::from_data(RawData::Array(Vec::new()))
    }

    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_data(RawData::Array(items.into_iter().map(Into::into).collect()))
    }

    /// An empty map.
    pub fn map() -> Self {
        Self::from_data(RawData::Map {
            entries: IndexMap::new(),
            weak: false,
        })
    }

    pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::from_data(RawData::Map {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            weak: false,
        })
    }

    /// An empty set.
    pub fn new_set() -> Self {
        Self::from_data(RawData::Set {
            items: IndexSet::new(),
            weak: false,
        })
    }

    pub fn set_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_data(RawData::Set {
            items: items.into_iter().map(Into::into).collect(),
            weak: false,
        })
    }

    /// A map keyed by object identity. Not iterable.
    pub fn weak_map() -> Self {
        Self::from_data(RawData::Map {
            entries: IndexMap::new(),
            weak: true,
        })
    }

    /// A set of objects. Not iterable.
    pub fn weak_set() -> Self {
        Self::from_data(RawData::Set {
            items: IndexSet::new(),
            weak: true,
        })
    }

    /// A value with identity that is never observed, such as a host handle.
    pub fn opaque(type_name: &str) -> Self {
        Self::from_data(RawData::Opaque(type_name.into()))
    }

    pub(crate) fn inner(&self) -> &ObjectInner {
        &self.0
    }

    pub(crate) fn as_proxy(&self) -> Option<&Proxy> {
        match self.inner() {
            ObjectInner::Proxy(proxy) => Some(proxy),
            ObjectInner::Raw(_) => None,
        }
    }

    /// The object directly wrapped by this one, if it is a wrapper.
    pub(crate) fn proxy_target(&self) -> Option<&Object> {
        self.as_proxy().map(|proxy| &proxy.target)
    }

    /// The innermost raw container.
    pub(crate) fn raw(&self) -> &RawObject {
        match self.inner() {
            ObjectInner::Raw(raw) => raw,
            ObjectInner::Proxy(proxy) => proxy.target.raw(),
        }
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &WeakObject) -> Option<Object> {
        weak.upgrade().map(Object)
    }

    pub fn kind(&self) -> ContainerKind {
        self.raw().kind()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Make the underlying container non-extensible. Frozen containers are
    /// never wrapped and reject new keys.
    pub fn freeze(&self) -> Self {
        self.raw().prevent_extensions();
        self.clone()
    }

    pub fn is_frozen(&self) -> bool {
        !self.raw().is_extensible()
    }

    // ------------------------------------------------------------------
    // Generic access
    // ------------------------------------------------------------------

    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        match self.inner() {
            ObjectInner::Raw(raw) => raw.get(&key),
            ObjectInner::Proxy(proxy) => proxy.handler.get(self, &proxy.target, &key),
        }
    }

    /// Write `key`. Returns `false` when the write was rejected.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into(), value.into());
        match self.inner() {
            ObjectInner::Raw(raw) => warn_or(raw.set(key, value), false),
            ObjectInner::Proxy(proxy) => proxy.handler.set(self, &proxy.target, key, value),
        }
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match self.inner() {
            ObjectInner::Raw(raw) => raw.has(&key),
            ObjectInner::Proxy(proxy) => proxy.handler.has(self, &proxy.target, &key),
        }
    }

    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match self.inner() {
            ObjectInner::Raw(raw) => raw.delete(&key),
            ObjectInner::Proxy(proxy) => proxy.handler.delete(self, &proxy.target, &key),
        }
    }

    /// Property names of a record, indices of an array, keys of a map or
    /// items of a set.
    pub fn own_keys(&self) -> Vec<Value> {
        match self.inner() {
            ObjectInner::Raw(raw) => raw.own_keys(),
            ObjectInner::Proxy(proxy) => proxy.handler.own_keys(self, &proxy.target),
        }
    }

    /// Element count for arrays and collections, key count for records.
    pub fn len(&self) -> usize {
        match self.kind() {
            ContainerKind::Array => self.get("length").as_length().unwrap_or(0),
            kind if kind.is_collection() => self.size(),
            _ => self.own_keys().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Associative containers
    // ------------------------------------------------------------------

    pub fn size(&self) -> usize {
        match self.inner() {
            ObjectInner::Raw(raw) if raw.kind().is_collection() => raw.entry_len(),
            ObjectInner::Raw(raw) => warn_or(
                Err(ReactivityError::Unsupported {
                    op: "size",
                    kind: raw.kind(),
                }),
                0,
            ),
            ObjectInner::Proxy(proxy) => proxy.handler.size(self, &proxy.target),
        }
    }

    /// Insert into a set. Returns `false` only when the insertion was
    /// rejected; re-adding an existing item is not an error.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        match self.inner() {
            ObjectInner::Raw(raw) => warn_or(raw.entry_add(value).map(|_| true), false),
            ObjectInner::Proxy(proxy) => proxy.handler.add(self, &proxy.target, value),
        }
    }

    pub fn clear(&self) {
        match self.inner() {
            ObjectInner::Raw(raw) => warn_or(raw.entry_clear(), ()),
            ObjectInner::Proxy(proxy) => proxy.handler.clear(self, &proxy.target),
        }
    }

    /// Call `f(value, key, container)` for every entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value, &Object)) {
        match self.inner() {
            ObjectInner::Raw(raw) => {
                for (key, value) in warn_or(raw.entry_pairs(), Vec::new()) {
                    f(value, key, self);
                }
            }
            ObjectInner::Proxy(proxy) => proxy.handler.for_each(self, &proxy.target, &mut f),
        }
    }

    pub(crate) fn iterate(&self, method: IterMethod) -> Entries {
        match self.inner() {
            ObjectInner::Raw(raw) => Entries::new(
                Box::new(warn_or(raw.entry_pairs(), Vec::new()).into_iter()),
                Wrap::Raw,
            ),
            ObjectInner::Proxy(proxy) => proxy.handler.iterate(self, &proxy.target, method),
        }
    }

    pub fn keys(&self) -> Keys {
        self.iterate(IterMethod::Keys).map(pair_key as fn((Value, Value)) -> Value)
    }

    pub fn values(&self) -> Values {
        self.iterate(IterMethod::Values).map(pair_value as fn((Value, Value)) -> Value)
    }

    pub fn entries(&self) -> Entries {
        self.iterate(IterMethod::Entries)
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Append `value`, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        self.push_all(vec![value.into()])
    }

    pub fn push_all(&self, values: Vec<Value>) -> usize {
        match self.inner() {
            ObjectInner::Raw(raw) => {
                let end = raw.array_len();
                warn_or(raw.array_splice(end, 0, values).map(|_| raw.array_len()), end)
            }
            ObjectInner::Proxy(proxy) => proxy.handler.push(self, &proxy.target, values),
        }
    }

    pub fn pop(&self) -> Value {
        match self.inner() {
            ObjectInner::Raw(raw) => {
                let start = raw.array_len().saturating_sub(1);
                warn_or(raw.array_splice(start, 1, Vec::new()), Vec::new())
                    .pop()
                    .unwrap_or_default()
            }
            ObjectInner::Proxy(proxy) => proxy.handler.pop(self, &proxy.target),
        }
    }

    pub fn shift(&self) -> Value {
        match self.inner() {
            ObjectInner::Raw(raw) => warn_or(raw.array_splice(0, 1, Vec::new()), Vec::new())
                .pop()
                .unwrap_or_default(),
            ObjectInner::Proxy(proxy) => proxy.handler.shift(self, &proxy.target),
        }
    }

    /// Prepend `values`, returning the new length.
    pub fn unshift(&self, values: Vec<Value>) -> usize {
        match self.inner() {
            ObjectInner::Raw(raw) => {
                let len = raw.array_len();
                warn_or(raw.array_splice(0, 0, values).map(|_| raw.array_len()), len)
            }
            ObjectInner::Proxy(proxy) => proxy.handler.unshift(self, &proxy.target, values),
        }
    }

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. Out-of-range arguments are clamped. Returns the removed
    /// elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        match self.inner() {
            ObjectInner::Raw(raw) => warn_or(raw.array_splice(start, delete_count, items), Vec::new()),
            ObjectInner::Proxy(proxy) => {
                proxy.handler.splice(self, &proxy.target, start, delete_count, items)
            }
        }
    }

    /// SameValueZero membership test.
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        let needle = needle.into();
        match self.inner() {
            ObjectInner::Raw(raw) => raw.array_items().contains(&needle),
            ObjectInner::Proxy(proxy) => proxy.handler.includes(self, &proxy.target, &needle),
        }
    }

    /// Position of the first strictly equal element.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        match self.inner() {
            ObjectInner::Raw(raw) => position(&raw.array_items(), &needle),
            ObjectInner::Proxy(proxy) => proxy.handler.index_of(self, &proxy.target, &needle),
        }
    }

    /// Position of the last strictly equal element.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        match self.inner() {
            ObjectInner::Raw(raw) => last_position(&raw.array_items(), &needle),
            ObjectInner::Proxy(proxy) => proxy.handler.last_index_of(self, &proxy.target, &needle),
        }
    }
}

pub(crate) fn position(items: &[Value], needle: &Value) -> Option<usize> {
    items.iter().position(|item| item.strict_equals(needle))
}

pub(crate) fn last_position(items: &[Value], needle: &Value) -> Option<usize> {
    items.iter().rposition(|item| item.strict_equals(needle))
}

fn pair_key((key, _): (Value, Value)) -> Value {
    key
}

fn pair_value((_, value): (Value, Value)) -> Value {
    value
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner() {
            ObjectInner::Raw(raw) => match raw.opaque_name() {
                Some(name) => write!(f, "{name}@{:x}", self.addr()),
                None => write!(f, "{}@{:x}", raw.kind(), self.addr()),
            },
            ObjectInner::Proxy(proxy) => write!(f, "{}({:?})", proxy.handler.label(), proxy.target),
        }
    }
}

/// Iterator over the entries of an associative container.
///
/// Values are wrapped one at a time as they are yielded, with the same
/// flavour as the container they came from.
pub struct Entries {
    source: Box<dyn Iterator<Item = (Value, Value)>>,
    wrap: Wrap,
}

impl Entries {
    pub(crate) fn new(source: Box<dyn Iterator<Item = (Value, Value)>>, wrap: Wrap) -> Self {
        Self { source, wrap }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Box::new(iter::empty()), Wrap::Raw)
    }
}

impl Iterator for Entries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.source.next()?;
        Some((self.wrap.apply(key), self.wrap.apply(value)))
    }
}

impl fmt::Debug for Entries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries").field("wrap", &self.wrap).finish_non_exhaustive()
    }
}

pub type Keys = iter::Map<Entries, fn((Value, Value)) -> Value>;
pub type Values = iter::Map<Entries, fn((Value, Value)) -> Value>;
