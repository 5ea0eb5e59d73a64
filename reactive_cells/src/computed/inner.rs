use crate::{
    error::ReactiveError,
    graph::{
        write_epoch, AnySubscriber, DependencyList, ReactiveNodeState,
        Registry, Source, Subscriber, Subscription, ToAnySubscriber,
        TrackingContext,
    },
};
use microtask_queue::Microtasks;
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    panic::{self, AssertUnwindSafe, Location},
    rc::{Rc, Weak},
};

pub(crate) type Getter<T> = Box<dyn Fn() -> Result<T, ReactiveError>>;
pub(crate) type Setter<S> = Box<dyn Fn(S)>;

pub(crate) struct ComputedInner<T: 'static, S: 'static> {
    pub(crate) value: RefCell<Option<Rc<T>>>,
    pub(crate) version: Cell<u64>,
    pub(crate) state: Cell<ReactiveNodeState>,
    /// The latest error, with the write epoch it was produced in.
    pub(crate) failure: RefCell<Option<(u64, ReactiveError)>>,
    pub(crate) queued: Cell<bool>,
    pub(crate) disposed: Cell<bool>,
    pub(crate) getter: Getter<T>,
    pub(crate) setter: Option<Setter<S>>,
    pub(crate) is_same: fn(&T, &T) -> bool,
    pub(crate) dependencies: DependencyList,
    pub(crate) subscribers: Registry<T>,
    pub(crate) this: Weak<ComputedInner<T, S>>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static Location<'static>,
}

impl<T: 'static, S: 'static> Debug for ComputedInner<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedInner")
            .field("state", &self.state.get())
            .field("queued", &self.queued.get())
            .field("disposed", &self.disposed.get())
            .field("version", &self.version.get())
            .finish_non_exhaustive()
    }
}

impl<T: 'static, S: 'static> ComputedInner<T, S> {
    #[track_caller]
    pub fn new(
        getter: Getter<T>,
        setter: Option<Setter<S>>,
        is_same: fn(&T, &T) -> bool,
    ) -> Rc<Self> {
        #[cfg(debug_assertions)]
        let defined_at = Location::caller();
        Rc::new_cyclic(|this| Self {
            value: RefCell::new(None),
            version: Cell::new(0),
            state: Cell::new(ReactiveNodeState::Dirty),
            failure: RefCell::new(None),
            queued: Cell::new(false),
            disposed: Cell::new(false),
            getter,
            setter,
            is_same,
            dependencies: DependencyList::default(),
            subscribers: Registry::new(),
            this: this.clone(),
            #[cfg(debug_assertions)]
            defined_at,
        })
    }

    pub fn is_computed(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Brings the cached value up to date, if it is stale.
    ///
    /// A failed getter leaves the node failed and reports the error both to subscribers and to
    /// the caller. Until some ref changes, later calls return the same error without running the
    /// getter or notifying anyone.
    pub fn compute(&self) -> Result<(), ReactiveError> {
        if self.disposed.get() || self.state.get() == ReactiveNodeState::Clean
        {
            return Ok(());
        }
        self.queued.set(false);
        if let Some(error) = self.unchanged_failure() {
            return Err(error);
        }
        let retry = self.state.replace(ReactiveNodeState::Clean)
            == ReactiveNodeState::Failed;

        if self.is_computed() && !retry && !self.dependencies.any_outdated() {
            return Ok(());
        }

        self.dependencies.clear();
        let (result, dependencies) =
            TrackingContext::collect(self.to_any_subscriber(), || {
                panic::catch_unwind(AssertUnwindSafe(|| (self.getter)()))
            });
        self.dependencies.replace(dependencies);

        match result.unwrap_or_else(|payload| Err(ReactiveError::from_panic(payload))) {
            Ok(value) => {
                let changed = self
                    .value
                    .borrow()
                    .as_deref()
                    .is_none_or(|previous| !(self.is_same)(previous, &value));
                self.failure.take();
                if changed {
                    let value = Rc::new(value);
                    *self.value.borrow_mut() = Some(Rc::clone(&value));
                    self.version.set(self.version.get() + 1);
                    self.subscribers.notify_next(&value);
                }
                Ok(())
            }
            Err(error) => {
                self.state.set(ReactiveNodeState::Failed);
                *self.failure.borrow_mut() = Some((write_epoch(), error.clone()));
                self.subscribers.notify_error(&error);
                Err(error)
            }
        }
    }

    fn unchanged_failure(&self) -> Option<ReactiveError> {
        if self.state.get() != ReactiveNodeState::Failed {
            return None;
        }
        self.failure
            .borrow()
            .as_ref()
            .filter(|(epoch, _)| *epoch == write_epoch())
            .map(|(_, error)| error.clone())
    }

    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.queued.set(false);
        self.dependencies.close();
        self.subscribers.notify_complete();
    }
}

impl<T: 'static, S: 'static> Subscriber for ComputedInner<T, S> {
    fn mark_dirty(&self) {
        if self.disposed.get() {
            return;
        }
        if self.state.get() == ReactiveNodeState::Clean {
            self.state.set(ReactiveNodeState::Dirty);
        }

        // nobody is listening: stay pull-based until the next read
        if self.queued.get() || self.subscribers.is_empty() {
            return;
        }
        self.queued.set(true);
        self.subscribers.notify_dirty();

        let this = self.this.clone();
        Microtasks::queue(move || {
            // a reader may have brought it up to date already
            if let Some(this) = this.upgrade().filter(|this| this.queued.get()) {
                // failures were already delivered to subscribers
                _ = this.compute();
            }
        });
    }
}

impl<T: 'static, S: 'static> ToAnySubscriber for ComputedInner<T, S> {
    fn to_any_subscriber(&self) -> AnySubscriber {
        let weak = self.this.clone() as Weak<dyn Subscriber>;
        AnySubscriber(self as *const Self as *const () as usize, weak)
    }
}

impl<T: 'static, S: 'static> Source for ComputedInner<T, S> {
    fn add_subscriber(&self, subscriber: AnySubscriber) -> Subscription {
        self.subscribers.subscribe(Rc::new(subscriber))
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn is_dirty(&self) -> bool {
        !self.disposed.get() && self.state.get() != ReactiveNodeState::Clean
    }

    fn update_if_necessary(&self) {
        _ = self.compute();
    }
}
