//! Dependency sets and per-target key maps.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::object::{ContainerKind, Object};
use crate::reactive::{Effect, EffectInner, Ref, SubscriberId};
use crate::value::Value;

/// Identifies one observable slot of a trackable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A named property of a record (also the `value` slot of a ref).
    Prop(Rc<str>),
    /// An array element.
    Index(usize),
    /// The length of an array.
    Length,
    /// An entry of an associative container, keyed by its raw key.
    Entry(Value),
    /// The set of keys or entries as a whole.
    Iterate,
    /// The key set of a map, which is insensitive to value updates.
    MapKeyIterate,
}

impl TrackKey {
    /// The slot every boxed reference is tracked under.
    pub fn ref_value() -> Self {
        TrackKey::Prop("value".into())
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Prop(name) => f.write_str(name),
            TrackKey::Index(index) => write!(f, "{index}"),
            TrackKey::Length => f.write_str("length"),
            TrackKey::Entry(key) => write!(f, "{key}"),
            TrackKey::Iterate => f.write_str("<iterate>"),
            TrackKey::MapKeyIterate => f.write_str("<map key iterate>"),
        }
    }
}

/// The set of effects subscribed to a single [`TrackKey`].
///
/// Members are held weakly and kept in insertion order. Dead entries are
/// pruned whenever the set is snapshotted for notification.
#[derive(Default)]
pub struct Dep {
    subscribers: RefCell<IndexMap<SubscriberId, Weak<EffectInner>>>,
}

impl Dep {
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn insert(&self, effect: &Effect) {
        self.subscribers
            .borrow_mut()
            .insert(effect.id(), effect.downgrade());
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Live subscribers in subscription order.
    pub(crate) fn live_subscribers(&self) -> Vec<Effect> {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        subscribers
            .values()
            .filter_map(Effect::upgrade)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Key map of a single trackable.
///
/// An empty map means the trackable was never read inside an effect, which
/// lets writes skip the graph entirely.
#[derive(Default)]
pub struct DepsMap {
    deps: RefCell<IndexMap<TrackKey, Rc<Dep>>>,
}

impl DepsMap {
    pub fn is_empty(&self) -> bool {
        self.deps.borrow().is_empty()
    }

    /// Number of live edges recorded under `key`.
    pub fn subscriber_count(&self, key: &TrackKey) -> usize {
        self.deps.borrow().get(key).map_or(0, |dep| dep.len())
    }

    pub(crate) fn get(&self, key: &TrackKey) -> Option<Rc<Dep>> {
        self.deps.borrow().get(key).cloned()
    }

    pub(crate) fn get_or_insert(&self, key: &TrackKey) -> Rc<Dep> {
        if let Some(dep) = self.get(key) {
            return dep;
        }
        let dep = Rc::new(Dep::default());
        self.deps.borrow_mut().insert(key.clone(), dep.clone());
        dep
    }

    pub(crate) fn all(&self) -> Vec<Rc<Dep>> {
        self.deps.borrow().values().cloned().collect()
    }

    pub(crate) fn matching(&self, mut predicate: impl FnMut(&TrackKey) -> bool) -> Vec<Rc<Dep>> {
        self.deps
            .borrow()
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(_, dep)| dep.clone())
            .collect()
    }
}

impl fmt::Debug for DepsMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.deps.borrow().iter().map(|(k, dep)| (k.to_string(), dep.len())))
            .finish()
    }
}

/// Borrowed trackable identity passed to [`track`](super::track) and
/// [`trigger`](super::trigger).
#[derive(Clone, Copy)]
pub(crate) enum TargetRef<'a> {
    Object(&'a Object),
    Ref(&'a Ref),
}

impl<'a> TargetRef<'a> {
    /// Containers are always tracked on their innermost raw identity.
    pub(crate) fn deps(self) -> &'a DepsMap {
        match self {
            TargetRef::Object(object) => object.raw().deps(),
            TargetRef::Ref(r) => r.deps(),
        }
    }

    pub(crate) fn kind(self) -> Option<ContainerKind> {
        match self {
            TargetRef::Object(object) => Some(object.kind()),
            TargetRef::Ref(_) => None,
        }
    }

    pub(crate) fn to_owned(self) -> Target {
        match self {
            TargetRef::Object(object) => Target::Object(object.clone()),
            TargetRef::Ref(r) => Target::Ref(r.clone()),
        }
    }
}

/// Owned trackable identity carried by debugger events.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Object(Object),
    Ref(Ref),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::EffectOptions;

    #[test]
    fn dep_tracks_membership_in_order() {
        let dep = Dep::default();
        let a = Effect::new(|| (), EffectOptions::new().lazy());
        let b = Effect::new(|| (), EffectOptions::new().lazy());

        dep.insert(&b);
        dep.insert(&a);

        assert!(dep.contains(a.id()));
        let order: Vec<_> = dep.live_subscribers().iter().map(Effect::id).collect();
        assert_eq!(order, vec![b.id(), a.id()]);

        dep.remove(b.id());
        assert_eq!(dep.len(), 1);
    }

    #[test]
    fn dropped_effects_are_pruned() {
        let dep = Dep::default();
        let effect = Effect::new(|| (), EffectOptions::new().lazy());
        dep.insert(&effect);
        drop(effect);

        assert!(dep.live_subscribers().is_empty());
        assert!(dep.is_empty());
    }

    #[test]
    fn deps_map_creates_sets_lazily() {
        let map = DepsMap::default();
        assert!(map.is_empty());
        assert!(map.get(&TrackKey::Length).is_none());

        let first = map.get_or_insert(&TrackKey::Length);
        let second = map.get_or_insert(&TrackKey::Length);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(map.matching(|k| *k == TrackKey::Length).len(), 1);
    }
}
