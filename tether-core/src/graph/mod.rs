//! Dependency Graph
//!
//! This module implements the fine-grained dependency graph that connects
//! observable state to the effects that read it.
//!
//! # Overview
//!
//! The graph is distributed rather than centralized:
//!
//! - Every trackable identity (a raw container or a boxed reference) owns a
//!   [`DepsMap`] from [`TrackKey`] to [`Dep`]
//! - A [`Dep`] is the set of effects that read that key
//! - Every effect keeps the list of [`Dep`]s it is a member of
//!
//! The two directions are always kept symmetric. Reads call [`track`], which
//! adds an edge for the running effect. Writes call [`trigger`], which looks
//! up the affected keys and re-runs (or schedules) their subscribers.
//!
//! # Design Decisions
//!
//! 1. Key-maps live on the trackable itself, so the whole sub-graph is
//!    released together with the container it describes.
//!
//! 2. Dep sets hold effects weakly. An effect lives as long as its owner
//!    holds the handle, and dropping the last handle detaches it.
//!
//! 3. Dep sets are insertion-ordered, which makes the notification order of
//!    a single trigger deterministic.

mod deps;
mod operations;
mod scheduler;

pub use deps::{Dep, DepsMap, Target, TrackKey};
pub use operations::{DebugOp, DebuggerEvent, TrackOp, TriggerOp};

pub(crate) use deps::TargetRef;
pub(crate) use scheduler::{track, trigger, Change};
