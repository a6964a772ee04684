//! Diagnostics
//!
//! Misuse of the reactive API never aborts the caller: writes to readonly
//! containers are dropped, non-containers are returned unwrapped, and so on.
//! Each of those situations is described by a [`ReactivityError`] which is
//! reported through [`warn`]. Reporting emits a `tracing` event under the
//! `tether::warn` target and, when diagnostics are enabled on the current
//! [`Runtime`](crate::reactive::Runtime), records the error so callers and
//! tests can inspect it with [`take_warnings`].

use thiserror::Error;

use crate::graph::TriggerOp;
use crate::object::ContainerKind;
use crate::reactive::Runtime;

/// A recoverable misuse of the reactive API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactivityError {
    #[error("{op} operation on key \"{key}\" failed: target is readonly")]
    ReadonlyMutation { op: TriggerOp, key: String },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("value cannot be made reactive: {value}")]
    NotObservable { value: String },

    #[error("to_refs() expects a reactive object but received a plain one")]
    ToRefsOnPlainObject,

    #[error(
        "reactive {kind} contains both the raw and reactive versions of the same object{}, \
         which can lead to inconsistencies; use only the reactive version if possible",
        key_suffix(.kind)
    )]
    AliasedKeys { kind: ContainerKind },

    #[error("{op} is not supported on a {kind} container")]
    Unsupported { op: &'static str, kind: ContainerKind },

    #[error("invalid value used as {kind} key: {value}")]
    InvalidWeakKey { kind: ContainerKind, value: String },
}

fn key_suffix(kind: &ContainerKind) -> &'static str {
    match kind {
        ContainerKind::Map | ContainerKind::WeakMap => " as keys",
        _ => "",
    }
}

/// Report a diagnostic on the current runtime.
pub fn warn(error: ReactivityError) {
    Runtime::current().warn(error);
}

/// Drain the diagnostics recorded by the current runtime.
pub fn take_warnings() -> Vec<ReactivityError> {
    Runtime::current().take_warnings()
}
