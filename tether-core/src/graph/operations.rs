//! Operation kinds and debugger events.

use std::fmt;

use serde::Serialize;

use super::deps::{Target, TrackKey};
use crate::reactive::Effect;
use crate::value::Value;

/// The kind of read that produced a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// The kind of write that is being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

impl TrackOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackOp::Get => "get",
            TrackOp::Has => "has",
            TrackOp::Iterate => "iterate",
        }
    }
}

impl TriggerOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerOp::Set => "set",
            TriggerOp::Add => "add",
            TriggerOp::Delete => "delete",
            TriggerOp::Clear => "clear",
        }
    }
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either side of a graph operation, as reported to debug hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Payload handed to `on_track` and `on_trigger` hooks.
///
/// `new_value`, `old_value` and `old_target` are only populated by triggers
/// that have them (an `add` has no old value, a `clear` carries a shallow
/// copy of the container as it was before clearing).
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: Effect,
    pub target: Target,
    pub op: DebugOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub old_target: Option<Value>,
}

impl DebuggerEvent {
    pub(crate) fn track(effect: Effect, target: Target, op: TrackOp, key: TrackKey) -> Self {
        Self {
            effect,
            target,
            op: DebugOp::Track(op),
            key: Some(key),
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }
}
