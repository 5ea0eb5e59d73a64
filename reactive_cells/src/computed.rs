//! Memoized values derived from other reactive nodes.

mod inner;

use crate::{
    cancel::CancellationToken,
    error::ReactiveError,
    graph::{AnySource, Observable, Observer, Source, Subscription, ToAnySource},
    traits::{DefinedAt, Dispose, IsDisposed, Set, WithUntracked},
};
use core::fmt::{Debug, Formatter, Result};
use inner::ComputedInner;
use std::{
    error::Error,
    hash::Hash,
    panic::Location,
    rc::{Rc, Weak},
};

/// A memoized value derived from other reactive nodes.
///
/// The getter runs lazily: not when the computed value is created, but the first time it is read
/// or subscribed to. After that it only runs again when a value it read during its last run has
/// actually changed; if a dependency was marked stale but turned out unchanged, the cached value
/// stands.
///
/// While a computed value has subscribers (effects, other computed values, or explicit
/// [`Observable::subscribe`] calls), a change upstream marks it stale at once and schedules its
/// recomputation on the [`microtask_queue`]. Without subscribers it simply waits for the next
/// read.
///
/// ```rust
/// use reactive_cells::{computed::Computed, prelude::*, signal::Ref};
/// use std::{cell::Cell, rc::Rc};
///
/// let runs = Rc::new(Cell::new(0));
/// let count = Ref::new(1);
/// let double = Computed::new({
///     let count = count.clone();
///     let runs = Rc::clone(&runs);
///     move || {
///         runs.set(runs.get() + 1);
///         count.get() * 2
///     }
/// });
///
/// // nothing has run yet
/// assert_eq!(runs.get(), 0);
///
/// assert_eq!(double.get(), 2);
/// assert_eq!(double.get(), 2);
/// assert_eq!(runs.get(), 1);
///
/// count.set(5);
/// assert_eq!(double.get(), 10);
/// assert_eq!(runs.get(), 2);
/// ```
pub struct Computed<T: 'static, S: 'static = T> {
    inner: Rc<ComputedInner<T, S>>,
}

impl<T: 'static, S: 'static> Clone for Computed<T, S> {
    #[track_caller]
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, S: 'static> Debug for Computed<T, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("Computed")
            .field("type", &std::any::type_name::<T>())
            .field("inner", &self.inner)
            .finish()
    }
}

impl<T: 'static, S: 'static> PartialEq for Computed<T, S> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static, S: 'static> Eq for Computed<T, S> {}

impl<T: 'static, S: 'static> Hash for Computed<T, S> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(&*self.inner, state);
    }
}

impl<T: PartialEq + 'static> Computed<T> {
    /// Creates a read-only computed value, using [`PartialEq`] to decide whether a recomputed
    /// value is a change.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::new_with_compare(getter, <T as PartialEq>::eq)
    }

    /// Creates a read-only computed value whose getter can fail.
    ///
    /// The error is delivered to subscribers and returned from
    /// [`try_get`](crate::traits::Get::try_get) as [`ReactiveError::Computation`]. The value
    /// stays stale: reads keep returning the same error until some ref changes, and the next
    /// read after that runs the getter again.
    #[track_caller]
    pub fn new_fallible<E: Error + 'static>(
        getter: impl Fn() -> std::result::Result<T, E> + 'static,
    ) -> Self {
        Self {
            inner: ComputedInner::new(
                Box::new(move || getter().map_err(ReactiveError::computation)),
                None,
                <T as PartialEq>::eq,
            ),
        }
    }

    /// Creates a read-only computed value that is disposed as soon as `token` fires. If the
    /// token has already fired, it starts out disposed and the getter never runs.
    #[track_caller]
    pub fn new_with_token(
        getter: impl Fn() -> T + 'static,
        token: &impl CancellationToken,
    ) -> Self {
        let this = Self::new(getter);
        this.dispose_on(token);
        this
    }
}

impl<T: 'static> Computed<T> {
    /// Creates a read-only computed value with a custom test for "this recomputed value is the
    /// same as the cached one".
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new_with_compare(
        getter: impl Fn() -> T + 'static,
        is_same: fn(&T, &T) -> bool,
    ) -> Self {
        Self {
            inner: ComputedInner::new(
                Box::new(move || Ok(getter())),
                None,
                is_same,
            ),
        }
    }
}

impl<T: PartialEq + 'static, S: 'static> Computed<T, S> {
    /// Creates a computed value that can also be [`Set`], by handing the new value to `setter`.
    ///
    /// The setter usually writes to one of the getter's dependencies; the computed value then
    /// updates like any other.
    ///
    /// ```rust
    /// use reactive_cells::{computed::Computed, prelude::*, signal::Ref};
    ///
    /// let celsius = Ref::new(100.0);
    /// let fahrenheit = Computed::new_writable(
    ///     {
    ///         let celsius = celsius.clone();
    ///         move || celsius.get() * 9.0 / 5.0 + 32.0
    ///     },
    ///     {
    ///         let celsius = celsius.clone();
    ///         move |f: f64| celsius.set((f - 32.0) * 5.0 / 9.0)
    ///     },
    /// );
    ///
    /// fahrenheit.set(32.0);
    /// assert_eq!(celsius.get(), 0.0);
    /// assert_eq!(fahrenheit.get(), 32.0);
    /// ```
    #[track_caller]
    pub fn new_writable(
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(S) + 'static,
    ) -> Self {
        Self::new_writable_with_compare(getter, setter, <T as PartialEq>::eq)
    }
}

impl<T: 'static, S: 'static> Computed<T, S> {
    #[track_caller]
    pub(crate) fn new_writable_with_compare(
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(S) + 'static,
        is_same: fn(&T, &T) -> bool,
    ) -> Self {
        Self {
            inner: ComputedInner::new(
                Box::new(move || Ok(getter())),
                Some(Box::new(setter)),
                is_same,
            ),
        }
    }

    /// Whether a [`Set`] call would reach a setter.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// The number of times the cached value has changed.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether the cached value is known to be stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    /// The sources read during the latest computation.
    pub fn sources(&self) -> Vec<AnySource> {
        self.inner.dependencies.sources()
    }

    fn dispose_on(&self, token: &impl CancellationToken) {
        if token.is_cancelled() {
            self.dispose();
        } else {
            let inner = Rc::downgrade(&self.inner);
            token.on_cancel(Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.dispose();
                }
            }));
        }
    }
}

impl<T: 'static, S: 'static> DefinedAt for Computed<T, S> {
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

impl<T: 'static, S: 'static> IsDisposed for Computed<T, S> {
    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: 'static, S: 'static> Dispose for Computed<T, S> {
    fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<T: 'static, S: 'static> WithUntracked for Computed<T, S> {
    type Value = T;

    fn try_with_untracked<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> std::result::Result<U, ReactiveError> {
        self.inner.compute()?;
        let value = self.inner.value.borrow().clone();
        match value {
            Some(value) => Ok(fun(&value)),
            None if self.inner.disposed.get() => Err(ReactiveError::Disposed),
            // only reachable when the getter reads this same value
            None => Err(ReactiveError::Cycle),
        }
    }
}

impl<T: 'static, S: 'static> Set for Computed<T, S> {
    type Value = S;

    fn try_set(&self, value: S) -> std::result::Result<(), ReactiveError> {
        if self.inner.disposed.get() {
            return Ok(());
        }
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => Err(ReactiveError::ReadOnly {
                defined_at: self.defined_at(),
            }),
        }
    }
}

impl<T: 'static, S: 'static> Observable for Computed<T, S> {
    type Value = T;

    fn subscribe_observer(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        // compute first, so that the subscriber starts from a value and only hears about
        // changes to it; a failure here surfaces on the next read instead
        if !self.inner.is_computed() {
            _ = self.inner.compute();
        }
        self.inner.subscribers.subscribe(observer)
    }
}

impl<T: 'static, S: 'static> ToAnySource for Computed<T, S> {
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
