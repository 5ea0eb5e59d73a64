//! Side effects that re-run when the values they read change.

mod inner;

use crate::{
    cancel::CancellationToken,
    graph::{untrack, AnySource, DependencyList},
    scope::Scope,
    traits::{DefinedAt, Dispose, IsDisposed},
};
use inner::EffectInner;
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    panic::{self, Location},
    rc::Rc,
};

/// A side effect that runs once immediately, and again whenever one of the values it read in
/// its latest run changes.
///
/// Re-runs are deferred to the [`microtask_queue`], so any number of changes made in one
/// synchronous turn lead to a single re-run. Before re-running, the effect checks that one of its
/// dependencies really has a new value, and it resets its [`Scope`]: effects and scopes created
/// during the previous run are disposed, and callbacks registered with
/// [`on_cleanup`](crate::scope::on_cleanup) run.
///
/// An effect belongs to the scope that was current when it was created, and lives until it or
/// that scope is disposed. Dropping the handle does not stop it.
///
/// ```rust
/// use microtask_queue::Microtasks;
/// use reactive_cells::{effect::Effect, prelude::*, signal::Ref};
/// use std::{cell::RefCell, rc::Rc};
///
/// let name = Ref::new("Alice");
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let effect = Effect::new({
///     let name = name.clone();
///     let log = Rc::clone(&log);
///     move || log.borrow_mut().push(name.get())
/// });
/// assert_eq!(*log.borrow(), ["Alice"]);
///
/// name.set("Bob");
/// Microtasks::flush();
/// assert_eq!(*log.borrow(), ["Alice", "Bob"]);
///
/// effect.dispose();
/// name.set("Carol");
/// Microtasks::flush();
/// assert_eq!(*log.borrow(), ["Alice", "Bob"]);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect").field("inner", &self.inner).finish()
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Effect {}

impl Effect {
    /// Creates an effect under the current scope and runs it.
    ///
    /// If `fun` panics during this first run, the panic propagates to the caller; the effect
    /// still re-runs when anything it read before panicking changes.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new(fun: impl FnMut() + 'static) -> Self {
        let this = Self::create(Box::new(fun));
        if !this.inner.disposed.get() {
            if let Err(payload) = this.inner.run_tracked() {
                panic::resume_unwind(payload);
            }
        }
        this
    }

    /// Creates an effect that is disposed as soon as `token` fires. If the token has already
    /// fired, the effect starts out disposed and never runs.
    #[track_caller]
    pub fn new_with_token(
        fun: impl FnMut() + 'static,
        token: &impl CancellationToken,
    ) -> Self {
        if token.is_cancelled() {
            let this = Self::create(Box::new(fun));
            this.dispose();
            return this;
        }

        let this = Self::new(fun);
        let inner = Rc::downgrade(&this.inner);
        token.on_cancel(Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                Effect { inner }.dispose();
            }
        }));
        this
    }

    #[track_caller]
    fn create(fun: Box<dyn FnMut()>) -> Self {
        let scope = Scope::new();
        #[cfg(debug_assertions)]
        let defined_at = Location::caller();
        let inner = Rc::new_cyclic(|this| EffectInner {
            fun: RefCell::new(fun),
            enabled: Cell::new(true),
            queued: Cell::new(false),
            disposed: Cell::new(scope.is_disposed()),
            has_run: Cell::new(false),
            dependencies: DependencyList::default(),
            scope: scope.clone(),
            this: this.clone(),
            #[cfg(debug_assertions)]
            defined_at,
        });
        if !scope.is_disposed() {
            scope.set_node(inner.clone());
        }
        Self { inner }
    }

    /// Runs the function right now, without tracking and without touching the dependencies or
    /// the scope. Does nothing once the effect is disposed, or while it is already running.
    pub fn run(&self) {
        if self.inner.disposed.get() {
            return;
        }
        if let Ok(mut fun) = self.inner.fun.try_borrow_mut() {
            untrack(|| (*fun)());
        }
    }

    /// Resumes automatic re-runs. Changes made while the effect was disabled are not replayed:
    /// the effect next runs when one of its dependencies changes again.
    pub fn enable(&self) {
        if !self.inner.disposed.get() {
            self.inner.enabled.set(true);
        }
    }

    /// Stops automatic re-runs, while staying subscribed to every dependency.
    pub fn disable(&self) {
        if !self.inner.disposed.get() {
            self.inner.enabled.set(false);
        }
    }

    /// Whether the effect re-runs automatically.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get() && !self.inner.disposed.get()
    }

    /// The sources read during the latest run.
    pub fn sources(&self) -> Vec<AnySource> {
        self.inner.dependencies.sources()
    }

    /// The effect's own scope, which is current while the effect runs.
    pub fn scope(&self) -> Scope {
        self.inner.scope.clone()
    }
}

impl Dispose for Effect {
    fn dispose(&self) {
        if self.inner.disposed.get() && self.inner.scope.is_disposed() {
            return;
        }
        // tearing down the scope disposes nested effects, then this one, then runs cleanups
        self.inner.scope.dispose();
        self.inner.disposed.set(true);
    }
}

impl IsDisposed for Effect {
    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl DefinedAt for Effect {
    fn defined_at(&self) -> Option<&'static Location<'static>> {
        #[cfg(debug_assertions)]
        {
            Some(self.inner.defined_at)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}
