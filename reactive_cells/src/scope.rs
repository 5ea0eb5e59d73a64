//! The ownership tree that tears reactive nodes down.

use crate::{
    cancel::CancellationToken,
    graph::{Observable, Observer, Registry, Subscription},
    traits::{DefinedAt, Dispose, IsDisposed},
};
use std::{
    any::Any,
    cell::RefCell,
    fmt::Debug,
    mem,
    panic::Location,
    rc::{Rc, Weak},
};

thread_local! {
    static SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

/// An observable recorded by [`Scope::observe`].
#[derive(Clone)]
pub struct Observed(Rc<dyn Any>);

impl Observed {
    /// Whether this is `observable`.
    pub fn is<O: PartialEq + 'static>(&self, observable: &O) -> bool {
        self.downcast_ref::<O>() == Some(observable)
    }

    /// The recorded observable, if it is an `O`.
    pub fn downcast_ref<O: 'static>(&self) -> Option<&O> {
        self.0.downcast_ref()
    }
}

impl Debug for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observed").field(&Rc::as_ptr(&self.0)).finish()
    }
}

/// A node in the ownership tree.
///
/// Every scope owns the scopes created under it, in creation order, and holds only a weak
/// reference to its parent. Disposing a scope disposes every descendant first (children in
/// creation order, each depth-first), then runs its own cleanup callbacks, then detaches from its
/// parent, and finally completes anything subscribed to it.
///
/// While a scope is running code with [`Scope::run`], it is the *current* scope: new scopes and
/// effects created in that time become its children. Each effect has a scope of its own, which
/// is current while the effect runs and is reset before each re-run.
///
/// ```rust
/// use reactive_cells::{prelude::*, scope::Scope};
/// use std::{cell::RefCell, rc::Rc};
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let root = Scope::detached();
/// root.run(|| {
///     let child = Scope::new();
///     child.on_dispose({
///         let log = Rc::clone(&log);
///         move || log.borrow_mut().push("child")
///     });
/// });
/// root.on_dispose({
///     let log = Rc::clone(&log);
///     move || log.borrow_mut().push("root")
/// });
///
/// root.dispose();
/// root.dispose();
/// assert_eq!(*log.borrow(), ["child", "root"]);
/// ```
#[derive(Clone)]
#[must_use]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    parent: RefCell<Option<Weak<ScopeInner>>>,
    state: RefCell<ScopeState>,
    disposal: Registry<()>,
    #[cfg(debug_assertions)]
    defined_at: &'static Location<'static>,
}

#[derive(Default)]
struct ScopeState {
    children: Vec<Scope>,
    observed: Vec<Observed>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    node: Option<Rc<dyn ScopeNode>>,
    disposed: bool,
}

/// A reactive node whose lifetime is tied to a scope.
pub(crate) trait ScopeNode {
    /// Detaches the node from the graph for good.
    fn teardown(&self);
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scope")
            .field("id", &Rc::as_ptr(&self.inner))
            .field("children", &state.children.len())
            .field("observed", &state.observed.len())
            .field("cleanups", &state.cleanups.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl Default for Scope {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a scope under the current scope, or a detached one if there is none.
    #[track_caller]
    pub fn new() -> Self {
        Self::create(Self::current().as_ref())
    }

    /// Creates a scope under `parent`.
    #[track_caller]
    pub fn with_parent(parent: &Scope) -> Self {
        Self::create(Some(parent))
    }

    /// Creates a scope with no parent, regardless of the current scope.
    ///
    /// Nothing else owns a detached scope: dropping its last handle disposes it.
    #[track_caller]
    pub fn detached() -> Self {
        Self::create(None)
    }

    /// Creates a scope under the current scope that is disposed as soon as `token` fires. If the
    /// token has already fired, the scope starts out disposed.
    #[track_caller]
    pub fn new_with_token(token: &impl CancellationToken) -> Self {
        let this = Self::new();
        if token.is_cancelled() {
            this.dispose();
        } else {
            let inner = Rc::downgrade(&this.inner);
            token.on_cancel(Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    Scope { inner }.dispose();
                }
            }));
        }
        this
    }

    #[track_caller]
    fn create(parent: Option<&Scope>) -> Self {
        let parent_disposed = parent.is_some_and(Scope::is_disposed);
        let this = Self {
            inner: Rc::new(ScopeInner {
                parent: RefCell::new(None),
                state: RefCell::new(ScopeState {
                    disposed: parent_disposed,
                    ..Default::default()
                }),
                disposal: Registry::new(),
                #[cfg(debug_assertions)]
                defined_at: Location::caller(),
            }),
        };

        if parent_disposed {
            // a disposed parent takes no children: this one is born disposed
            this.inner.disposal.notify_complete();
        } else if let Some(parent) = parent {
            *this.inner.parent.borrow_mut() = Some(Rc::downgrade(&parent.inner));
            parent
                .inner
                .state
                .borrow_mut()
                .children
                .push(this.clone());
        }
        this
    }

    /// Returns the current scope, if any.
    pub fn current() -> Option<Scope> {
        SCOPE.with(|scope| {
            scope
                .try_borrow()
                .ok()?
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|inner| Scope { inner })
        })
    }

    /// Runs `fun` with this as the current scope, restoring the previous one afterwards (even if
    /// `fun` panics).
    pub fn run<T>(&self, fun: impl FnOnce() -> T) -> T {
        struct Restore(Option<Weak<ScopeInner>>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                SCOPE.with_borrow_mut(|scope| *scope = prev);
            }
        }

        let prev = SCOPE.with_borrow_mut(|scope| {
            scope.replace(Rc::downgrade(&self.inner))
        });
        let _restore = Restore(prev);
        fun()
    }

    /// The parent scope, if it still exists and this scope is attached to it.
    pub fn parent(&self) -> Option<Scope> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Scope { inner })
    }

    /// The child scopes, in creation order.
    pub fn children(&self) -> Vec<Scope> {
        self.inner.state.borrow().children.clone()
    }

    /// Records `observable` as observed by this scope. Ignored once the scope is disposed, and
    /// for an observable that is already recorded.
    ///
    /// Any [`Observable`] can be observed, not only the nodes of this crate. Two observables are
    /// the same one if they are of the same type and compare equal.
    pub fn observe<O>(&self, observable: &O)
    where
        O: Observable + Clone + PartialEq + 'static,
    {
        let mut state = self.inner.state.borrow_mut();
        if state.disposed
            || state.observed.iter().any(|observed| observed.is(observable))
        {
            return;
        }
        state.observed.push(Observed(Rc::new(observable.observable())));
    }

    /// The observables recorded with [`Scope::observe`], in the order they were first observed.
    pub fn observables(&self) -> Vec<Observed> {
        self.inner.state.borrow().observed.clone()
    }

    /// Registers a callback to run when this scope is disposed. A disposed scope runs it
    /// immediately.
    pub fn on_dispose(&self, fun: impl FnOnce() + 'static) {
        let mut state = self.inner.state.borrow_mut();
        if state.disposed {
            drop(state);
            fun();
        } else {
            state.cleanups.push(Box::new(fun));
        }
    }

    pub(crate) fn set_node(&self, node: Rc<dyn ScopeNode>) {
        self.inner.state.borrow_mut().node = Some(node);
    }

    /// Disposes the children and runs the cleanup callbacks, but keeps the scope itself (and
    /// its node) alive. Used between the runs of an effect.
    pub(crate) fn reset(&self) {
        let (children, cleanups) = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return;
            }
            (
                mem::take(&mut state.children),
                mem::take(&mut state.cleanups),
            )
        };
        for child in children {
            child.dispose();
        }
        for cleanup in cleanups {
            cleanup();
        }
    }

    fn detach_from_parent(&self) {
        let parent = self.inner.parent.borrow_mut().take();
        if let Some(parent) = parent.and_then(|parent| parent.upgrade()) {
            let removed = {
                let mut state = parent.state.borrow_mut();
                state
                    .children
                    .iter()
                    .position(|child| child == self)
                    .map(|index| state.children.remove(index))
            };
            drop(removed);
        }
    }
}

/// Registers a callback to run the next time the current scope is reset or disposed.
///
/// Inside an effect, this runs before the effect's next run and when the effect is disposed.
/// Outside of any scope, the callback is dropped without running.
pub fn on_cleanup(fun: impl FnOnce() + 'static) {
    if let Some(scope) = Scope::current() {
        scope.on_dispose(fun);
    }
}

type Teardown = (Vec<Scope>, Option<Rc<dyn ScopeNode>>, Vec<Box<dyn FnOnce()>>);

impl ScopeInner {
    fn take_for_teardown(&self) -> Option<Teardown> {
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return None;
        }
        state.disposed = true;
        state.observed.clear();
        Some((
            mem::take(&mut state.children),
            state.node.take(),
            mem::take(&mut state.cleanups),
        ))
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let Some((children, node, cleanups)) = self.take_for_teardown() {
            for child in children {
                child.dispose();
            }
            if let Some(node) = node {
                node.teardown();
            }
            for cleanup in cleanups {
                cleanup();
            }
            self.disposal.notify_complete();
        }
    }
}

impl Dispose for Scope {
    fn dispose(&self) {
        let Some((children, node, cleanups)) = self.inner.take_for_teardown()
        else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(scope = ?Rc::as_ptr(&self.inner), "disposing scope");

        for child in children {
            child.dispose();
        }
        if let Some(node) = node {
            node.teardown();
        }
        for cleanup in cleanups {
            cleanup();
        }
        self.detach_from_parent();
        self.inner.disposal.notify_complete();
    }
}

impl IsDisposed for Scope {
    fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }
}

impl DefinedAt for Scope {
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

/// A scope can be observed for its disposal: subscribers receive `complete` once, when it is
/// disposed, and nothing else.
impl Observable for Scope {
    type Value = ();

    fn subscribe_observer(&self, observer: Rc<dyn Observer<()>>) -> Subscription {
        self.inner.disposal.subscribe(observer)
    }
}
