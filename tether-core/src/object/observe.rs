//! Wrapper factory and introspection.
//!
//! `reactive`, `shallow_reactive`, `readonly` and `shallow_readonly` wrap a
//! container in the matching flavour. Wrapping is canonical: the runtime's
//! registry hands back the existing wrapper for a target when there is one.
//!
//! Containers that are skipped ([`mark_raw`]), frozen or opaque are returned
//! unwrapped. Non-containers are returned as-is with a diagnostic.

use super::handler::{Flavor, Handler};
use super::{collection, record, Object};
use crate::error::{warn, ReactivityError};
use crate::reactive::{Ref, Runtime};
use crate::value::Value;

/// Types the wrapper factory and introspection functions accept.
///
/// Implemented for [`Object`] and for [`Value`], so callers can wrap either
/// a container they hold directly or whatever value they read out of one.
pub trait Observable: Clone {
    fn as_object(&self) -> Option<&Object>;

    fn from_object(object: Object) -> Self;

    fn as_boxed(&self) -> Option<&Ref> {
        None
    }

    fn describe(&self) -> String;
}

impl Observable for Object {
    fn as_object(&self) -> Option<&Object> {
        Some(self)
    }

    fn from_object(object: Object) -> Self {
        object
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

impl Observable for Value {
    fn as_object(&self) -> Option<&Object> {
        Value::as_object(self)
    }

    fn from_object(object: Object) -> Self {
        Value::Object(object)
    }

    fn as_boxed(&self) -> Option<&Ref> {
        Value::as_boxed(self)
    }

    fn describe(&self) -> String {
        Value::describe(self)
    }
}

fn wrap<T: Observable>(target: T, flavor: Flavor) -> T {
    let Some(object) = target.as_object().cloned() else {
        warn(ReactivityError::NotObservable {
            value: target.describe(),
        });
        return target;
    };
    T::from_object(create_proxy(&object, flavor))
}

/// Wrap `object` in `flavor`, reusing the canonical wrapper when it exists.
pub(crate) fn create_proxy(target: &Object, flavor: Flavor) -> Object {
    if let Some(proxy) = target.as_proxy() {
        // Already wrapped. Only a read-only layer over a reactive wrapper
        // produces something new.
        let layering = flavor.is_readonly() && proxy.handler.reactive_flag();
        if proxy.handler.exposes_raw() && !layering {
            return target.clone();
        }
    }

    let runtime = Runtime::current();
    let family = runtime.wrappers().family(flavor.is_readonly());
    if let Some(existing) = family.get(target) {
        return existing;
    }

    let raw = target.raw();
    if raw.is_skipped() || !raw.is_extensible() || !raw.kind().is_observable() {
        return target.clone();
    }

    let handler: &'static dyn Handler = if raw.kind().is_collection() {
        collection::handler_for(flavor)
    } else {
        record::handler_for(flavor)
    };
    let proxy = Object::new_proxy(target.clone(), handler);
    family.insert(target, &proxy);
    tracing::trace!(flavor = ?flavor, kind = %raw.kind(), "wrapper created");
    proxy
}

/// Deep mutable wrapper. A read-only value is returned unchanged.
pub fn reactive<T: Observable>(target: T) -> T {
    if is_readonly(&target) {
        return target;
    }
    wrap(target, Flavor::Reactive)
}

/// Mutable wrapper that neither wraps nested objects nor unwraps refs.
pub fn shallow_reactive<T: Observable>(target: T) -> T {
    wrap(target, Flavor::ShallowReactive)
}

/// Deep read-only wrapper.
pub fn readonly<T: Observable>(target: T) -> T {
    wrap(target, Flavor::Readonly)
}

/// Read-only wrapper whose nested objects stay as they are.
pub fn shallow_readonly<T: Observable>(target: T) -> T {
    wrap(target, Flavor::ShallowReadonly)
}

/// Wrap object values with [`reactive`], pass everything else through.
pub(crate) fn to_reactive(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(reactive(object)),
        other => other,
    }
}

/// Whether `value` is a mutable wrapper, or a read-only layer over one.
pub fn is_reactive<T: Observable>(value: &T) -> bool {
    let Some(proxy) = value.as_object().and_then(Object::as_proxy) else {
        return false;
    };
    if proxy.handler.is_readonly() {
        return is_reactive(&proxy.target);
    }
    proxy.handler.reactive_flag()
}

/// Whether `value` is a read-only wrapper or a read-only ref.
pub fn is_readonly<T: Observable>(value: &T) -> bool {
    if let Some(r) = value.as_boxed() {
        return r.is_readonly();
    }
    value
        .as_object()
        .and_then(Object::as_proxy)
        .is_some_and(|proxy| proxy.handler.is_readonly())
}

pub fn is_proxy<T: Observable>(value: &T) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// Strip every wrapper layer and return the raw container.
pub fn to_raw<T: Observable>(value: &T) -> T {
    let Some(mut object) = value.as_object() else {
        return value.clone();
    };
    while let Some(proxy) = object.as_proxy() {
        if !proxy.handler.exposes_raw() {
            break;
        }
        object = &proxy.target;
    }
    T::from_object(object.clone())
}

/// Exclude the container from ever being wrapped.
pub fn mark_raw<T: Observable>(value: T) -> T {
    if let Some(object) = value.as_object() {
        object.raw().mark_skip();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_warnings;
    use crate::reactive::{ref_, Runtime, RuntimeConfig};

    #[test]
    fn wrappers_are_canonical() {
        let raw = Object::record();
        let first = reactive(raw.clone());

        assert_eq!(reactive(raw.clone()), first);
        assert_eq!(reactive(first.clone()), first);
        assert_ne!(first, raw);
        assert!(to_raw(&first).ptr_eq(&raw));
    }

    #[test]
    fn readonly_layers_over_reactive() {
        let raw = Object::record();
        let state = reactive(raw.clone());
        let view = readonly(state.clone());

        assert_ne!(view, state);
        assert!(is_readonly(&view));
        assert!(is_reactive(&view));
        assert_eq!(readonly(view.clone()), view);
        assert_eq!(reactive(view.clone()), view);
        assert!(to_raw(&view).ptr_eq(&raw));
    }

    #[test]
    fn readonly_of_raw_is_not_reactive() {
        let view = readonly(Object::record());
        assert!(is_readonly(&view));
        assert!(!is_reactive(&view));
        assert!(is_proxy(&view));
    }

    #[test]
    fn skipped_and_frozen_are_never_wrapped() {
        let skipped = mark_raw(Object::record());
        assert_eq!(reactive(skipped.clone()), skipped);

        let frozen = Object::record().freeze();
        assert_eq!(reactive(frozen.clone()), frozen);

        let opaque = Object::opaque("Handle");
        assert!(!is_proxy(&reactive(opaque)));
    }

    #[test]
    fn values_can_be_wrapped() {
        let value = reactive(Value::from(Object::array()));
        assert!(is_reactive(&value));
        assert!(is_reactive(&reactive(value.clone())));
    }

    #[test]
    fn primitives_warn_and_pass_through() {
        Runtime::install(RuntimeConfig::development());
        let value = reactive(Value::from(1));

        assert_eq!(value, 1);
        assert_eq!(
            take_warnings(),
            vec![ReactivityError::NotObservable { value: "1".to_string() }]
        );
    }

    #[test]
    fn to_raw_keeps_refs() {
        let r = ref_(1);
        let value = Value::from(&r);
        assert_eq!(to_raw(&value), value);
    }
}
