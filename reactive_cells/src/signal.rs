//! Atomic reactive cells.

use crate::{
    cancel::CancellationToken,
    error::ReactiveError,
    graph::{
        bump_write_epoch, AnySource, AnySubscriber, Observable, Observer,
        Registry, Source, Subscription, ToAnySource,
    },
    traits::{DefinedAt, Dispose, IsDisposed, Set, WithUntracked},
};
use core::fmt::{Debug, Formatter, Result};
use std::{
    cell::{Cell, RefCell},
    hash::Hash,
    panic::Location,
    rc::{Rc, Weak},
};

/// A reference-counted reactive cell.
///
/// Reading the value with [`Get`](crate::traits::Get) or [`With`](crate::traits::With) inside a
/// computed value or an effect subscribes that node to this ref. Setting the value notifies every
/// subscriber synchronously, unless the new value is equal to the old one, in which case nothing
/// happens at all.
///
/// ```rust
/// use reactive_cells::{prelude::*, signal::Ref};
///
/// let count = Ref::new(0);
/// assert_eq!(count.version(), 0);
///
/// count.set(1);
/// assert_eq!(count.get(), 1);
/// assert_eq!(count.version(), 1);
///
/// // equal values are ignored
/// count.set(1);
/// assert_eq!(count.version(), 1);
///
/// count.update(|n| *n += 1);
/// assert_eq!(count.get_untracked(), 2);
/// ```
pub struct Ref<T: 'static> {
    pub(crate) inner: Rc<RefInner<T>>,
}

pub(crate) struct RefInner<T: 'static> {
    value: RefCell<Rc<T>>,
    version: Cell<u64>,
    is_same: fn(&T, &T) -> bool,
    subscribers: Registry<T>,
    forwarding: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
    #[cfg(debug_assertions)]
    defined_at: &'static Location<'static>,
}

impl<T: 'static> Clone for Ref<T> {
    #[track_caller]
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Debug for Ref<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("Ref")
            .field("type", &std::any::type_name::<T>())
            .field("ptr", &Rc::as_ptr(&self.inner))
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: 'static> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Eq for Ref<T> {}

impl<T: 'static> Hash for Ref<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(&*self.inner, state);
    }
}

impl<T: PartialEq + 'static> Default for Ref<T>
where
    T: Default,
{
    #[track_caller]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq + 'static> Ref<T> {
    /// Creates a new ref, using [`PartialEq`] to decide whether a new value is a change.
    ///
    /// Setting the very same shared value is never a change, but otherwise `PartialEq` decides.
    /// For floats that means `NAN` is never equal to itself, so setting `NAN` over `NAN` notifies;
    /// use [`Ref::new_with_compare`] with a bitwise comparison if that matters.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new(value: T) -> Self {
        Self::new_with_compare(value, <T as PartialEq>::eq)
    }

    /// Creates a ref that is disposed as soon as `token` fires. If the token has already fired,
    /// the ref starts out disposed.
    #[track_caller]
    pub fn new_with_token(value: T, token: &impl CancellationToken) -> Self {
        let this = Self::new(value);
        this.dispose_on(token);
        this
    }
}

impl<T: 'static> Ref<T> {
    /// Creates a new ref with a custom test for "this new value is the same as the old one".
    ///
    /// ```rust
    /// use reactive_cells::{prelude::*, signal::Ref};
    /// use std::rc::Rc;
    ///
    /// // compare by identity rather than by contents
    /// let list = Ref::new_with_compare(Rc::new(vec![1]), Rc::ptr_eq);
    /// list.set(Rc::new(vec![1]));
    /// assert_eq!(list.version(), 1);
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new_with_compare(value: T, is_same: fn(&T, &T) -> bool) -> Self {
        Self::from_shared(Rc::new(value), is_same)
    }

    #[track_caller]
    pub(crate) fn from_shared(value: Rc<T>, is_same: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Rc::new(RefInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                is_same,
                subscribers: Registry::new(),
                forwarding: RefCell::new(None),
                disposed: Cell::new(false),
                #[cfg(debug_assertions)]
                defined_at: Location::caller(),
            }),
        }
    }

    /// Creates a ref that mirrors `source` until it is set directly.
    #[track_caller]
    pub fn forwarding(source: &Ref<T>) -> Self {
        let this = Self::from_shared(
            Rc::clone(&source.inner.value.borrow()),
            source.inner.is_same,
        );
        this.forward_from(source);
        this
    }

    /// Makes this ref mirror `source`: it takes on the source's current value now, and every
    /// later one, until it is set directly or starts forwarding from somewhere else.
    pub fn forward_from(&self, source: &Ref<T>) {
        if self.inner.disposed.get() || self == source {
            return;
        }
        self.inner.sever_forwarding();
        self.inner
            .store(Rc::clone(&source.inner.value.borrow()));

        let subscription = source.subscribe(Forward {
            target: Rc::downgrade(&self.inner),
            source: Rc::downgrade(&source.inner),
        });
        *self.inner.forwarding.borrow_mut() = Some(subscription);
    }

    /// Whether this ref is currently mirroring another one.
    pub fn is_forwarding(&self) -> bool {
        self.inner
            .forwarding
            .borrow()
            .as_ref()
            .is_some_and(|subscription| !subscription.is_closed())
    }

    /// The number of times the value has changed.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    fn dispose_on(&self, token: &impl CancellationToken) {
        if token.is_cancelled() {
            self.dispose();
        } else {
            let inner = Rc::downgrade(&self.inner);
            token.on_cancel(Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    Ref { inner }.dispose();
                }
            }));
        }
    }
}

impl<T: 'static> RefInner<T> {
    fn sever_forwarding(&self) {
        let forwarding = self.forwarding.borrow_mut().take();
        if let Some(subscription) = forwarding {
            subscription.unsubscribe();
        }
    }

    fn store(&self, value: Rc<T>) {
        let same = {
            let current = self.value.borrow();
            Rc::ptr_eq(&current, &value) || (self.is_same)(&**current, &*value)
        };
        if same {
            return;
        }

        *self.value.borrow_mut() = Rc::clone(&value);
        self.version.set(self.version.get() + 1);
        bump_write_epoch();
        if !self.disposed.get() {
            self.subscribers.notify_next(&value);
        }
    }
}

impl<T: 'static> Drop for RefInner<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.forwarding.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

struct Forward<T: 'static> {
    target: Weak<RefInner<T>>,
    source: Weak<RefInner<T>>,
}

impl<T: 'static> Observer<T> for Forward<T> {
    fn next(&self, _value: &T) {
        if let (Some(target), Some(source)) =
            (self.target.upgrade(), self.source.upgrade())
        {
            let value = Rc::clone(&source.value.borrow());
            target.store(value);
        }
    }
}

impl<T: 'static> DefinedAt for Ref<T> {
    #[inline(always)]
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

impl<T: 'static> IsDisposed for Ref<T> {
    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: 'static> Dispose for Ref<T> {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.sever_forwarding();
        self.inner.subscribers.notify_complete();
    }
}

impl<T: 'static> WithUntracked for Ref<T> {
    type Value = T;

    fn try_with_untracked<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> std::result::Result<U, ReactiveError> {
        let value = Rc::clone(&self.inner.value.borrow());
        Ok(fun(&value))
    }
}

impl<T: 'static> Set for Ref<T> {
    type Value = T;

    fn try_set(&self, value: T) -> std::result::Result<(), ReactiveError> {
        self.inner.sever_forwarding();
        self.inner.store(Rc::new(value));
        Ok(())
    }
}

impl<T: 'static> Observable for Ref<T> {
    type Value = T;

    fn subscribe_observer(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        self.inner.subscribers.subscribe(observer)
    }
}

impl<T: 'static> Source for RefInner<T> {
    fn add_subscriber(&self, subscriber: AnySubscriber) -> Subscription {
        self.subscribers.subscribe(Rc::new(subscriber))
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn is_dirty(&self) -> bool {
        false
    }

    fn update_if_necessary(&self) {}
}

impl<T: 'static> ToAnySource for Ref<T> {
    fn to_any_source(&self) -> AnySource {
        let weak = Rc::downgrade(&self.inner) as Weak<dyn Source>;
        AnySource(
            Rc::as_ptr(&self.inner) as *const () as usize,
            weak,
            #[cfg(debug_assertions)]
            self.inner.defined_at,
        )
    }
}
