use crate::{
    error::ReactiveError,
    graph::{AnySubscriber, DependencyList, Subscriber, ToAnySubscriber, TrackingContext},
    log_warning,
    scope::{Scope, ScopeNode},
};
use microtask_queue::Microtasks;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    fmt::Debug,
    panic::{self, AssertUnwindSafe, Location},
    rc::Weak,
};

pub(crate) struct EffectInner {
    pub(crate) fun: RefCell<Box<dyn FnMut()>>,
    pub(crate) enabled: Cell<bool>,
    pub(crate) queued: Cell<bool>,
    pub(crate) disposed: Cell<bool>,
    pub(crate) has_run: Cell<bool>,
    pub(crate) dependencies: DependencyList,
    pub(crate) scope: Scope,
    pub(crate) this: Weak<EffectInner>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static Location<'static>,
}

impl Debug for EffectInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectInner")
            .field("enabled", &self.enabled.get())
            .field("queued", &self.queued.get())
            .field("disposed", &self.disposed.get())
            .finish_non_exhaustive()
    }
}

impl EffectInner {
    /// Resets the effect's scope and runs the function, tracking whatever it reads.
    ///
    /// A panic in the function is caught and handed back, after the dependencies it managed to
    /// read have been recorded.
    pub fn run_tracked(&self) -> Result<(), Box<dyn Any + Send>> {
        self.scope.reset();
        self.dependencies.clear();

        let (result, dependencies) =
            TrackingContext::collect(self.to_any_subscriber(), || {
                self.scope.run(|| {
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut fun = self.fun.borrow_mut();
                        (*fun)()
                    }))
                })
            });
        self.dependencies.replace(dependencies);
        self.has_run.set(true);
        result
    }

    fn rerun(&self) {
        self.queued.set(false);
        if self.disposed.get() || !self.enabled.get() {
            return;
        }
        if self.has_run.get() && !self.dependencies.any_outdated() {
            return;
        }
        if self.fun.try_borrow_mut().is_err() {
            // already running further up the stack
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(effect = ?self.this.as_ptr(), "re-running effect");

        if let Err(payload) = self.run_tracked() {
            let error = ReactiveError::from_panic(payload);
            #[cfg(debug_assertions)]
            log_warning(format_args!(
                "The effect defined at {} panicked while re-running: {error}",
                self.defined_at
            ));
            #[cfg(not(debug_assertions))]
            log_warning(format_args!(
                "An effect panicked while re-running: {error}"
            ));
        }
    }
}

impl Subscriber for EffectInner {
    fn mark_dirty(&self) {
        if self.disposed.get() || !self.enabled.get() || self.queued.get() {
            return;
        }
        self.queued.set(true);

        let this = self.this.clone();
        Microtasks::queue(move || {
            if let Some(this) = this.upgrade() {
                this.rerun();
            }
        });
    }
}

impl ToAnySubscriber for EffectInner {
    fn to_any_subscriber(&self) -> AnySubscriber {
        let weak = self.this.clone() as Weak<dyn Subscriber>;
        AnySubscriber(self as *const Self as *const () as usize, weak)
    }
}

impl ScopeNode for EffectInner {
    fn teardown(&self) {
        self.disposed.set(true);
        self.queued.set(false);
        self.dependencies.close();
    }
}
