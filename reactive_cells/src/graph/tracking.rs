use super::{AnySource, AnySubscriber, Source, Subscription};
use rustc_hash::FxHashSet;
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    mem,
};

thread_local! {
    static STACK: RefCell<Vec<Option<Collector>>> = const { RefCell::new(Vec::new()) };
}

/// An edge recorded while tracking: the source that was read, the live subscription from that
/// source to the reader, and the source's version at the moment it was read.
pub struct Dependency {
    source: AnySource,
    subscription: Subscription,
    version: u64,
}

impl Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("source", &self.source)
            .field("version", &self.version)
            .finish()
    }
}

impl Dependency {
    /// The source that was read.
    pub fn source(&self) -> &AnySource {
        &self.source
    }

    /// The subscription that connects the source to the reader.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// The source's version when it was read.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the source has changed since it was read.
    ///
    /// A stale derived source is brought up to date first, with this edge disabled so that the
    /// reader isn't notified about a change it is in the middle of checking for. A source that
    /// is still stale afterwards has failed, which always counts as a change.
    pub fn is_outdated(&self) -> bool {
        if self.source.is_dirty() {
            self.subscription.disable();
            self.source.update_if_necessary();
            self.subscription.enable();
            if self.source.is_dirty() {
                return true;
            }
        }
        self.source.version() != self.version
    }
}

struct Collector {
    subscriber: AnySubscriber,
    seen: FxHashSet<usize>,
    dependencies: Vec<Dependency>,
}

impl Collector {
    fn release(self) {
        for dependency in self.dependencies {
            dependency.subscription.unsubscribe();
        }
    }
}

/// The stack of active dependency collectors.
///
/// While a collector is on top of the stack, every tracked read subscribes the collector's
/// subscriber to the source being read, right away.
pub struct TrackingContext;

impl TrackingContext {
    /// Runs `fun` with a fresh collector bound to `subscriber`, and returns its result along
    /// with every source it read.
    ///
    /// The previous collector is restored afterwards, even if `fun` panics. Subscriptions made
    /// by a panicking `fun` are closed.
    pub fn collect<T>(
        subscriber: AnySubscriber,
        fun: impl FnOnce() -> T,
    ) -> (T, Vec<Dependency>) {
        let frame = Frame::push(Some(Collector {
            subscriber,
            seen: FxHashSet::default(),
            dependencies: Vec::new(),
        }));
        let value = fun();
        let dependencies = frame
            .pop()
            .map(|collector| collector.dependencies)
            .unwrap_or_default();
        (value, dependencies)
    }

    /// Whether a collector is currently active.
    pub fn is_tracking() -> bool {
        STACK.with_borrow(|stack| matches!(stack.last(), Some(Some(_))))
    }

    /// Records a read of `source` in the active collector, if any.
    ///
    /// Each source is recorded at most once per collector, and a subscriber never records
    /// itself.
    pub fn track(source: AnySource) {
        let subscriber = STACK.with_borrow(|stack| match stack.last() {
            Some(Some(collector))
                if collector.subscriber.0 != source.0
                    && !collector.seen.contains(&source.0) =>
            {
                Some(collector.subscriber.clone())
            }
            _ => None,
        });
        let Some(subscriber) = subscriber else {
            return;
        };

        let subscription = source.add_subscriber(subscriber.clone());
        let version = source.version();
        let dependency = Dependency {
            source,
            subscription,
            version,
        };

        let rejected = STACK.with_borrow_mut(|stack| match stack.last_mut() {
            Some(Some(collector)) if collector.subscriber == subscriber => {
                collector.seen.insert(dependency.source.0);
                collector.dependencies.push(dependency);
                None
            }
            _ => Some(dependency),
        });
        if let Some(dependency) = rejected {
            dependency.subscription.unsubscribe();
        }
    }
}

/// Runs `fun` without tracking any reads.
pub fn untrack<T>(fun: impl FnOnce() -> T) -> T {
    let frame = Frame::push(None);
    let value = fun();
    frame.pop();
    value
}

/// Whether a reactive read right now would be tracked.
pub fn is_tracking() -> bool {
    TrackingContext::is_tracking()
}

struct Frame;

impl Frame {
    fn push(collector: Option<Collector>) -> Self {
        STACK.with_borrow_mut(|stack| stack.push(collector));
        Frame
    }

    fn pop(self) -> Option<Collector> {
        mem::forget(self);
        STACK.with_borrow_mut(Vec::pop).flatten()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(collector) = STACK.with_borrow_mut(Vec::pop).flatten() {
            collector.release();
        }
    }
}

/// The dependencies captured by a node's latest evaluation.
#[derive(Default)]
pub(crate) struct DependencyList {
    dependencies: RefCell<Vec<Dependency>>,
    closed: Cell<bool>,
}

impl DependencyList {
    pub fn replace(&self, dependencies: Vec<Dependency>) {
        let previous = if self.closed.get() {
            dependencies
        } else {
            mem::replace(&mut *self.dependencies.borrow_mut(), dependencies)
        };
        for dependency in previous {
            dependency.subscription.unsubscribe();
        }
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// Unsubscribes everything, and refuses anything captured afterwards.
    pub fn close(&self) {
        self.closed.set(true);
        let previous = mem::take(&mut *self.dependencies.borrow_mut());
        for dependency in previous {
            dependency.subscription.unsubscribe();
        }
    }

    pub fn any_outdated(&self) -> bool {
        let dependencies = mem::take(&mut *self.dependencies.borrow_mut());
        let outdated = dependencies.iter().any(Dependency::is_outdated);
        self.replace(dependencies);
        outdated
    }

    pub fn sources(&self) -> Vec<AnySource> {
        self.dependencies
            .borrow()
            .iter()
            .map(|dependency| dependency.source.clone())
            .collect()
    }
}

impl Drop for DependencyList {
    fn drop(&mut self) {
        for dependency in self.dependencies.get_mut().drain(..) {
            dependency.subscription.unsubscribe();
        }
    }
}
