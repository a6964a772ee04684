//! Tether Core
//!
//! This crate provides a fine-grained reactivity core: observable
//! containers that record which computations read which keys, and re-run
//! exactly those computations when the keys change.
//!
//! It implements:
//!
//! - Reactive and read-only wrappers over records, arrays, maps and sets
//! - Effects with optional schedulers and debug hooks
//! - Cached computed values
//! - Refs: single reactive cells, including custom and projected ones
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic [`Value`] stored in containers
//! - `object`: containers, wrappers and the handlers that intercept them
//! - `graph`: the dependency graph, `track` and `trigger`
//! - `reactive`: effects, the tracking context, computed values and refs
//! - `error`: misuse diagnostics
//!
//! Everything is single-threaded. Each thread has its own [`Runtime`].
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_core::{computed, effect, reactive, EffectOptions, Object};
//!
//! // Create reactive state
//! let state = reactive(Object::record_from([("count", 0)]));
//!
//! // Create a derived value
//! let source = state.clone();
//! let doubled = computed(move || source.get("count").as_number().unwrap_or(0.0) * 2.0);
//!
//! // Create an effect
//! let _runner = effect(
//!     move || println!("doubled: {}", doubled.get()),
//!     EffectOptions::default(),
//! );
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically runs, prints: "doubled: 10"
//! ```

pub mod error;
pub mod graph;
pub mod object;
pub mod reactive;
pub mod value;

pub use error::{take_warnings, ReactivityError};
pub use graph::{DebugOp, DebuggerEvent, Target, TrackKey, TrackOp, TriggerOp};
pub use object::{
    is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, ContainerKind, Entries, IterMethod, Keys, Object, Observable,
    Values,
};
pub use reactive::{
    computed, computed_with_setter, custom_ref, effect, enable_tracking, is_ref, pause_tracking,
    proxy_refs, ref_, reset_tracking, shallow_ref, stop, to_ref, to_refs, trigger_ref, unref,
    untracked, Computed, ComputedState, Effect, EffectOptions, Ref, RefHooks, Runtime,
    RuntimeConfig,
};
pub use value::{has_changed, Value};
