//! Dynamic Values
//!
//! Everything that flows through the interception layer is a [`Value`]. The
//! model is deliberately small: scalars, strings, shared container handles
//! ([`Object`]) and boxed references ([`Ref`]).
//!
//! # Equality
//!
//! `Value` equality is *SameValueZero*:
//!
//! - `NaN` equals `NaN`, `+0` equals `-0`
//! - strings compare by content
//! - objects and refs compare by identity
//!
//! The same relation drives change detection: a write only notifies when
//! [`has_changed`] reports a difference, so assigning `NaN` over `NaN` is a
//! no-op. `Hash` is consistent with it, which lets values serve as keys of
//! associative containers and of the dependency graph.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::ReactivityError;
use crate::object::Object;
use crate::reactive::{untracked, Ref};

/// Maximum nesting depth rendered by [`Value::to_json`].
const SNAPSHOT_DEPTH: usize = 32;

/// Largest array length, `2^32 - 1`.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Largest array index.
pub const MAX_ARRAY_INDEX: usize = MAX_ARRAY_LENGTH - 1;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(Object),
    Ref(Ref),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The boxed reference held by this value, if any.
    pub fn as_boxed(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as an array index, at most [`MAX_ARRAY_INDEX`].
    ///
    /// Accepts non-negative integral numbers and canonical decimal strings
    /// (`"3"` but not `"03"` or `"3.0"`).
    pub fn as_index(&self) -> Option<usize> {
        self.as_length().filter(|index| *index <= MAX_ARRAY_INDEX)
    }

    /// Interpret the value as an array length, at most [`MAX_ARRAY_LENGTH`].
    pub fn as_length(&self) -> Option<usize> {
        let length = match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
                if *n > MAX_ARRAY_LENGTH as f64 {
                    return None;
                }
                *n as usize
            }
            Value::Str(s) => parse_index(s)?,
            _ => return None,
        };
        (length <= MAX_ARRAY_LENGTH).then_some(length)
    }

    /// Strict equality: like `==` but `NaN` is never equal to itself.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Ref(_) => "ref",
        }
    }

    /// Render the value as a property name.
    pub(crate) fn property_name(&self) -> Option<Rc<str>> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Number(n) => Some(number_to_key(*n).into()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.into()),
            Value::Null => Some("null".into()),
            Value::Undefined => Some("undefined".into()),
            Value::Object(_) | Value::Ref(_) => None,
        }
    }

    /// Short human-readable description used in diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_key(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(object) => format!("{object:?}"),
            Value::Ref(r) => format!("{r:?}"),
        }
    }

    /// Snapshot the value as JSON without recording dependencies.
    ///
    /// Proxies are rendered through their raw container, refs through their
    /// current value. Maps become arrays of `[key, value]` pairs, sets become
    /// arrays. Nesting deeper than 32 levels (including cycles) is cut off
    /// with `null`.
    pub fn to_json(&self) -> serde_json::Value {
        untracked(|| snapshot(self, SNAPSHOT_DEPTH))
    }
}

fn snapshot(value: &Value, depth: usize) -> serde_json::Value {
    use serde_json::Value as Json;

    if depth == 0 {
        return Json::Null;
    }
    match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Ref(r) => snapshot(&r.get(), depth - 1),
        Value::Object(object) => object.raw().snapshot(|v| snapshot(v, depth - 1)),
    }
}

/// Whether a write of `value` over `old` counts as a change.
pub fn has_changed(value: &Value, old: &Value) -> bool {
    value != old
}

fn parse_index(s: &str) -> Option<usize> {
    let index: usize = s.parse().ok()?;
    (index.to_string() == s).then_some(index)
}

fn number_to_key(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                // +0 / -0 and every NaN payload must land in the same bucket.
                let bits = if *n == 0.0 {
                    0u64
                } else if n.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Object(object) => object.addr().hash(state),
            Value::Ref(r) => r.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(object) => fmt::Debug::fmt(object, f),
            Value::Ref(r) => fmt::Debug::fmt(r, f),
            other => f.write_str(&other.describe()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(object.clone())
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<&Ref> for Value {
    fn from(r: &Ref) -> Self {
        Value::Ref(r.clone())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// JSON objects become raw records, JSON arrays raw arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Object(Object::array_from(items.into_iter().map(Value::from))),
            Json::Object(entries) => Value::Object(Object::record_from(
                entries.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl TryFrom<serde_json::Value> for Object {
    type Error = ReactivityError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match Value::from(json) {
            Value::Object(object) => Ok(object),
            other => Err(ReactivityError::NotObservable {
                value: other.describe(),
            }),
        }
    }
}

macro_rules! impl_eq_scalar {
    ($($ty:ty),*) => {
        $(
            impl PartialEq<$ty> for Value {
                fn eq(&self, other: &$ty) -> bool {
                    *self == Value::from(*other)
                }
            }
        )*
    };
}

impl_eq_scalar!(bool, i32, i64, u32, usize, f64);

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nan_is_equal_to_itself() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(!Value::from(f64::NAN).strict_equals(&Value::from(f64::NAN)));
    }

    #[test]
    fn signed_zeroes_are_equal() {
        assert_eq!(Value::from(0.0), Value::from(-0.0));

        let mut set = HashSet::new();
        set.insert(Value::from(0.0));
        assert!(set.contains(&Value::from(-0.0)));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::record();
        let b = Object::record();

        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn index_parsing_is_canonical() {
        assert_eq!(Value::from("3").as_index(), Some(3));
        assert_eq!(Value::from("03").as_index(), None);
        assert_eq!(Value::from(2.5).as_index(), None);
        assert_eq!(Value::from(-1).as_index(), None);
        assert_eq!(Value::from(7usize).as_index(), Some(7));
    }

    #[test]
    fn indices_and_lengths_are_bounded() {
        assert_eq!(Value::from(MAX_ARRAY_INDEX).as_index(), Some(MAX_ARRAY_INDEX));
        assert_eq!(Value::from(MAX_ARRAY_LENGTH).as_index(), None);
        assert_eq!(Value::from(MAX_ARRAY_LENGTH).as_length(), Some(MAX_ARRAY_LENGTH));
        assert_eq!(Value::from(1e18).as_length(), None);
        assert_eq!(Value::from(f64::INFINITY).as_length(), None);
        assert_eq!(Value::from("4294967296").as_length(), None);
    }

    #[test]
    fn numbers_render_as_property_names() {
        assert_eq!(Value::from(1).property_name().as_deref(), Some("1"));
        assert_eq!(Value::from(1.5).property_name().as_deref(), Some("1.5"));
        assert_eq!(Value::from(f64::NAN).property_name().as_deref(), Some("NaN"));
    }

    #[test]
    fn json_round_trips_through_snapshot() {
        let json = serde_json::json!({
            "name": "tether",
            "tags": ["a", "b"],
            "nested": { "n": 1.0 }
        });

        let value = Value::from(json.clone());
        assert!(value.is_object());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn scalar_json_is_not_an_object() {
        assert!(Object::try_from(serde_json::json!(3)).is_err());
        assert!(Object::try_from(serde_json::json!([1, 2])).is_ok());
    }
}
