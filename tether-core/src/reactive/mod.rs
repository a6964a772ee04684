//! Reactive Primitives
//!
//! This module implements the subscriber side of the system: effects, the
//! tracking context that tells reads which effect is running, computed
//! values and the ref family.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a re-runnable computation. While it runs, every tracked read
//! records the effect as a dependent of the key that was read. When one of
//! those keys changes, the effect runs again (or is handed to its
//! scheduler).
//!
//! ## Refs
//!
//! A Ref is a single reactive cell with identity. Refs can be stored inside
//! reactive records, which unwrap them on read.
//!
//! ## Computed
//!
//! A Computed is a ref whose value is derived from other reactive state. It
//! caches its value and only re-runs its getter when read after one of its
//! dependencies changed.
//!
//! # Implementation Notes
//!
//! All state lives in a per-thread [`Runtime`]. Reads consult the runtime's
//! [`TrackingContext`] to find the running effect; writes walk the
//! dependency graph in [`crate::graph`].

mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod subscriber;

pub use computed::{computed, computed_with_setter, Computed, ComputedState};
pub use context::{
    enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext,
    TrackingContext,
};
pub use effect::{
    effect, stop, DebugHook, Effect, EffectBody, EffectOptions, IntoEffectBody, Scheduler,
};
pub use refs::{
    custom_ref, is_ref, proxy_refs, ref_, shallow_ref, to_ref, to_refs, trigger_ref, unref, Ref,
    RefHooks,
};
pub use runtime::{Runtime, RuntimeConfig};
pub use subscriber::SubscriberId;

pub(crate) use context::TrackingPause;
pub(crate) use effect::EffectInner;
