//! Reactive Runtime
//!
//! The runtime owns every piece of process-wide state the reactive system
//! needs: the tracking context, the wrapper registries and the diagnostics
//! buffer.
//!
//! # How It Works
//!
//! 1. Each thread has one current runtime, created on first use with the
//!    default [`RuntimeConfig`].
//!
//! 2. [`Runtime::install`] replaces it with a fresh runtime, which is how
//!    callers (and tests) get an isolated environment with a specific
//!    configuration.
//!
//! 3. Wrappers are canonicalized through the registries: wrapping the same
//!    raw container twice in the same family yields the same wrapper for as
//!    long as that wrapper is alive.
//!
//! # Thread Safety
//!
//! Reactive values are built on `Rc` and `RefCell` and never cross threads,
//! so the runtime is a plain thread-local. A value created under one runtime
//! keeps working after another is installed, but it will not share wrapper
//! identity or diagnostics with values created later.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use super::context::TrackingContext;
use crate::error::ReactivityError;
use crate::object::{Object, WeakObject};

thread_local! {
    static CURRENT: RefCell<Rc<Runtime>> = RefCell::new(Rc::new(Runtime::new(RuntimeConfig::default())));
}

/// Number of registry entries after which dead wrappers are swept.
const PRUNE_THRESHOLD: usize = 64;

/// Behavioural switches of a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Report misuse through `tracing` and the diagnostics buffer.
    pub dev_warnings: bool,
    /// Invoke `on_track` / `on_trigger` hooks and capture `old_target` on
    /// `clear`.
    pub debug_hooks: bool,
    /// Capacity of the diagnostics buffer. The oldest entries are dropped
    /// first.
    pub max_diagnostics: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dev_warnings: cfg!(debug_assertions),
            debug_hooks: cfg!(debug_assertions),
            max_diagnostics: 256,
        }
    }
}

impl RuntimeConfig {
    /// Everything off: no warnings, no debug hooks.
    pub fn production() -> Self {
        Self {
            dev_warnings: false,
            debug_hooks: false,
            max_diagnostics: 0,
        }
    }

    /// Everything on, regardless of build profile.
    pub fn development() -> Self {
        Self {
            dev_warnings: true,
            debug_hooks: true,
            ..Self::default()
        }
    }
}

/// Canonical wrapper lookup for one family (mutable or read-only).
///
/// Keys are raw target addresses, values are weak wrapper handles. A lookup
/// only succeeds while the wrapper is alive and still wraps the queried
/// target, so a reused address can never resolve to a stale wrapper.
#[derive(Default)]
pub(crate) struct ProxyMap {
    entries: RefCell<HashMap<usize, WeakObject>>,
    prune_at: Cell<usize>,
}

impl ProxyMap {
    pub(crate) fn get(&self, target: &Object) -> Option<Object> {
        let weak = self.entries.borrow().get(&target.addr()).cloned()?;
        let proxy = Object::upgrade(&weak)?;
        proxy.proxy_target()?.ptr_eq(target).then_some(proxy)
    }

    pub(crate) fn insert(&self, target: &Object, proxy: &Object) {
        let mut entries = self.entries.borrow_mut();
        entries.insert(target.addr(), proxy.downgrade());

        if entries.len() >= self.prune_at.get().max(PRUNE_THRESHOLD) {
            entries.retain(|_, weak| weak.strong_count() > 0);
            self.prune_at.set(entries.len() * 2);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// The two wrapper registries. Shallow-reactive wrappers share the mutable
/// family and shallow-readonly wrappers share the read-only one.
#[derive(Default)]
pub(crate) struct WrapperRegistry {
    pub(crate) reactive: ProxyMap,
    pub(crate) readonly: ProxyMap,
}

impl WrapperRegistry {
    pub(crate) fn family(&self, readonly: bool) -> &ProxyMap {
        if readonly {
            &self.readonly
        } else {
            &self.reactive
        }
    }
}

/// The per-thread reactive runtime.
pub struct Runtime {
    config: RuntimeConfig,
    context: TrackingContext,
    wrappers: WrapperRegistry,
    diagnostics: RefCell<VecDeque<ReactivityError>>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            context: TrackingContext::new(),
            wrappers: WrapperRegistry::default(),
            diagnostics: RefCell::new(VecDeque::new()),
        }
    }

    /// The runtime of the calling thread.
    pub fn current() -> Rc<Runtime> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Replace the calling thread's runtime with a fresh one.
    pub fn install(config: RuntimeConfig) -> Rc<Runtime> {
        let runtime = Rc::new(Runtime::new(config));
        CURRENT.with(|current| *current.borrow_mut() = runtime.clone());
        tracing::debug!(config = ?runtime.config, "runtime installed");
        runtime
    }

    /// Replace the calling thread's runtime with a default one.
    pub fn reset() -> Rc<Runtime> {
        Self::install(RuntimeConfig::default())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn context(&self) -> &TrackingContext {
        &self.context
    }

    pub(crate) fn wrappers(&self) -> &WrapperRegistry {
        &self.wrappers
    }

    /// Report a misuse diagnostic.
    pub(crate) fn warn(&self, error: ReactivityError) {
        if !self.config.dev_warnings {
            return;
        }
        tracing::warn!(target: "tether::warn", "{error}");

        if self.config.max_diagnostics == 0 {
            return;
        }
        let mut diagnostics = self.diagnostics.borrow_mut();
        if diagnostics.len() >= self.config.max_diagnostics {
            diagnostics.pop_front();
        }
        diagnostics.push_back(error);
    }

    /// Drain the recorded diagnostics, oldest first.
    pub fn take_warnings(&self) -> Vec<ReactivityError> {
        self.diagnostics.borrow_mut().drain(..).collect()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("reactive_wrappers", &self.wrappers.reactive.len())
            .field("readonly_wrappers", &self.wrappers.readonly.len())
            .field("diagnostics", &self.diagnostics.borrow().len())
            .finish()
    }
}
