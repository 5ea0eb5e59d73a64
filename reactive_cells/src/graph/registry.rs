use super::Observer;
use crate::error::ReactiveError;
use slotmap::{DefaultKey, SlotMap};
use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    iter,
    rc::{Rc, Weak},
};

/// The lifecycle of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Receives every notification.
    Enabled,
    /// Temporarily receives nothing, but can be enabled again.
    Disabled,
    /// Permanently detached from its source.
    Closed,
}

/// A multicast list of observers, notified in the order they subscribed.
///
/// Adding and removing subscribers are both O(1). Every broadcast works from a snapshot of the
/// subscribers that were enabled when it began, and re-checks each one just before delivery:
/// a subscription that is disabled or closed partway through a broadcast is skipped for the rest
/// of it, while one that is added or re-enabled partway through waits for the next broadcast.
pub struct Registry<T: ?Sized + 'static> {
    inner: Rc<RefCell<RegistryInner<T>>>,
}

impl<T: ?Sized + 'static> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized + 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("len", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

struct RegistryInner<T: ?Sized + 'static> {
    entries: SlotMap<DefaultKey, Entry<T>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    closed: bool,
}

struct Entry<T: ?Sized + 'static> {
    observer: Rc<dyn Observer<T>>,
    state: Rc<Cell<SubscriptionState>>,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

type Snapshot<T> = Vec<(Rc<Cell<SubscriptionState>>, Rc<dyn Observer<T>>)>;

impl<T: ?Sized + 'static> RegistryInner<T> {
    fn push_back(
        &mut self,
        observer: Rc<dyn Observer<T>>,
        state: Rc<Cell<SubscriptionState>>,
    ) -> DefaultKey {
        let key = self.entries.insert(Entry {
            observer,
            state,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.entries[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    fn unlink(&mut self, key: DefaultKey) -> Option<Entry<T>> {
        let entry = self.entries.remove(key)?;
        match entry.prev {
            Some(prev) => self.entries[prev].next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => self.entries[next].prev = entry.prev,
            None => self.tail = entry.prev,
        }
        Some(entry)
    }

    fn keys(&self) -> impl Iterator<Item = DefaultKey> + '_ {
        iter::successors(self.head, |key| self.entries[*key].next)
    }

    fn enabled(&self) -> Snapshot<T> {
        self.keys()
            .map(|key| &self.entries[key])
            .filter(|entry| entry.state.get() == SubscriptionState::Enabled)
            .map(|entry| (Rc::clone(&entry.state), Rc::clone(&entry.observer)))
            .collect()
    }
}

trait Detach {
    fn detach(&self, key: DefaultKey);
}

impl<T: ?Sized + 'static> Detach for RefCell<RegistryInner<T>> {
    fn detach(&self, key: DefaultKey) {
        // the observer is dropped after the borrow ends, so its destructor may touch this list
        let removed = self.borrow_mut().unlink(key);
        drop(removed);
    }
}

impl<T: ?Sized + 'static> Registry<T> {
    /// Creates an empty, open registry.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                entries: SlotMap::new(),
                head: None,
                tail: None,
                closed: false,
            })),
        }
    }

    /// Adds an observer to the end of the list.
    ///
    /// If the registry has already completed, the observer's `complete` runs immediately and the
    /// returned subscription is already closed.
    pub fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        if self.is_closed() {
            observer.complete();
            return Subscription::closed();
        }

        let state = Rc::new(Cell::new(SubscriptionState::Enabled));
        let key = self
            .inner
            .borrow_mut()
            .push_back(observer, Rc::clone(&state));
        let registry = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription {
            registry,
            key,
            state,
        }
    }

    /// The number of subscriptions that have not been closed, enabled or not.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether there are no open subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`Registry::notify_complete`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Sends a new value to every enabled subscriber.
    pub fn notify_next(&self, value: &T) {
        self.broadcast(|observer| observer.next(value));
    }

    /// Sends an error to every enabled subscriber.
    pub fn notify_error(&self, error: &ReactiveError) {
        self.broadcast(|observer| observer.error(error));
    }

    /// Tells every enabled subscriber that the source may be about to change.
    pub fn notify_dirty(&self) {
        self.broadcast(|observer| observer.mark_dirty());
    }

    /// Completes the source: every subscription is closed, and each one that was still enabled
    /// when its turn came receives `complete`. Later subscribers complete immediately.
    pub fn notify_complete(&self) {
        let entries = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let keys = inner.keys().collect::<Vec<_>>();
            let entries = keys
                .into_iter()
                .filter_map(|key| inner.entries.remove(key))
                .collect::<Vec<_>>();
            inner.head = None;
            inner.tail = None;
            entries
        };

        for entry in entries {
            if entry.state.replace(SubscriptionState::Closed)
                == SubscriptionState::Enabled
            {
                entry.observer.complete();
            }
        }
    }

    fn broadcast(&self, notify: impl Fn(&dyn Observer<T>)) {
        let snapshot = self.inner.borrow().enabled();
        for (state, observer) in snapshot {
            if state.get() == SubscriptionState::Enabled {
                notify(&*observer);
            }
        }
    }
}

/// One observer's registration with one source.
///
/// The handle only refers weakly to its source, so holding it never keeps the source alive.
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    registry: Weak<dyn Detach>,
    key: DefaultKey,
    state: Rc<Cell<SubscriptionState>>,
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state.get())
            .finish()
    }
}

impl Subscription {
    /// A subscription that was closed from the start.
    pub fn closed() -> Self {
        let registry =
            Weak::<RefCell<RegistryInner<()>>>::new() as Weak<dyn Detach>;
        Self {
            registry,
            key: DefaultKey::default(),
            state: Rc::new(Cell::new(SubscriptionState::Closed)),
        }
    }

    /// The current state.
    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    /// Whether the subscription is closed for good.
    pub fn is_closed(&self) -> bool {
        self.state.get() == SubscriptionState::Closed
    }

    /// Whether the subscription currently receives notifications.
    pub fn is_enabled(&self) -> bool {
        self.state.get() == SubscriptionState::Enabled
    }

    /// Stops notifications until [`Subscription::enable`] is called. No-op once closed.
    pub fn disable(&self) {
        if self.state.get() == SubscriptionState::Enabled {
            self.state.set(SubscriptionState::Disabled);
        }
    }

    /// Resumes notifications, starting with the next broadcast. No-op once closed.
    pub fn enable(&self) {
        if self.state.get() == SubscriptionState::Disabled {
            self.state.set(SubscriptionState::Enabled);
        }
    }

    /// Closes the subscription and removes it from its source. Idempotent.
    pub fn unsubscribe(&self) {
        if self.state.replace(SubscriptionState::Closed)
            != SubscriptionState::Closed
        {
            if let Some(registry) = self.registry.upgrade() {
                registry.detach(self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Callbacks;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recording(log: &Log, name: &'static str) -> Rc<dyn Observer<i32>> {
        Rc::new(
            Callbacks::new()
                .on_next({
                    let log = Rc::clone(log);
                    move |value: &i32| {
                        log.borrow_mut().push(format!("{name}:{value}"))
                    }
                })
                .on_complete({
                    let log = Rc::clone(log);
                    move || log.borrow_mut().push(format!("{name}:done"))
                }),
        )
    }

    #[test]
    fn notifies_in_insertion_order() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let _a = registry.subscribe(recording(&log, "a"));
        let b = registry.subscribe(recording(&log, "b"));
        let _c = registry.subscribe(recording(&log, "c"));

        registry.notify_next(&1);
        b.unsubscribe();
        let _d = registry.subscribe(recording(&log, "d"));
        registry.notify_next(&2);

        assert_eq!(
            *log.borrow(),
            ["a:1", "b:1", "c:1", "a:2", "c:2", "d:2"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn disabled_subscriptions_are_skipped_until_enabled() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let a = registry.subscribe(recording(&log, "a"));

        a.disable();
        registry.notify_next(&1);
        assert!(log.borrow().is_empty());
        assert_eq!(registry.len(), 1);

        a.enable();
        registry.notify_next(&2);
        assert_eq!(*log.borrow(), ["a:2"]);
    }

    #[test]
    fn disabling_mid_broadcast_takes_effect_immediately() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let victim = Rc::new(RefCell::new(None::<Subscription>));

        let _first = registry.subscribe(Rc::new(Callbacks::new().on_next({
            let victim = Rc::clone(&victim);
            move |_: &i32| {
                if let Some(victim) = &*victim.borrow() {
                    victim.disable();
                }
            }
        })));
        *victim.borrow_mut() = Some(registry.subscribe(recording(&log, "b")));

        registry.notify_next(&1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn enabling_mid_broadcast_waits_for_the_next_one() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let late = Rc::new(RefCell::new(None::<Subscription>));

        let _first = registry.subscribe(Rc::new(Callbacks::new().on_next({
            let late = Rc::clone(&late);
            move |_: &i32| {
                if let Some(late) = &*late.borrow() {
                    late.enable();
                }
            }
        })));
        let second = registry.subscribe(recording(&log, "b"));
        second.disable();
        *late.borrow_mut() = Some(second);

        registry.notify_next(&1);
        assert!(log.borrow().is_empty());
        registry.notify_next(&2);
        assert_eq!(*log.borrow(), ["b:2"]);
    }

    #[test]
    fn unsubscribing_itself_during_broadcast() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let own = Rc::new(RefCell::new(None::<Subscription>));

        let subscription = registry.subscribe(Rc::new(Callbacks::new().on_next({
            let own = Rc::clone(&own);
            let log = Rc::clone(&log);
            move |value: &i32| {
                log.borrow_mut().push(format!("once:{value}"));
                if let Some(own) = &*own.borrow() {
                    own.unsubscribe();
                }
            }
        })));
        *own.borrow_mut() = Some(subscription);
        let _other = registry.subscribe(recording(&log, "other"));

        registry.notify_next(&1);
        registry.notify_next(&2);
        assert_eq!(*log.borrow(), ["once:1", "other:1", "other:2"]);
    }

    #[test]
    fn complete_closes_everything_once() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let a = registry.subscribe(recording(&log, "a"));
        let b = registry.subscribe(recording(&log, "b"));
        b.disable();

        registry.notify_complete();
        registry.notify_complete();
        registry.notify_next(&1);

        assert_eq!(*log.borrow(), ["a:done"]);
        assert!(a.is_closed());
        assert!(b.is_closed());
        b.enable();
        assert!(b.is_closed());
        assert!(registry.is_empty());
    }

    #[test]
    fn subscribing_after_complete_completes_immediately() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        registry.notify_complete();

        let late = registry.subscribe(recording(&log, "late"));
        assert!(late.is_closed());
        assert_eq!(*log.borrow(), ["late:done"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let log = Log::default();
        let registry = Registry::<i32>::new();
        let first = registry.subscribe(recording(&log, "first"));
        first.unsubscribe();
        let _second = registry.subscribe(recording(&log, "second"));

        first.unsubscribe();
        registry.notify_next(&1);
        assert_eq!(*log.borrow(), ["second:1"]);
    }
}
