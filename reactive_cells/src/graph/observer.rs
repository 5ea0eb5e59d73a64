use super::Subscription;
use crate::error::ReactiveError;
use std::{fmt::Debug, rc::Rc};

/// Receives notifications from an [`Observable`].
///
/// Every callback is optional.
pub trait Observer<T: ?Sized> {
    /// The source has a new value.
    fn next(&self, _value: &T) {}

    /// The source failed to produce a value.
    fn error(&self, _error: &ReactiveError) {}

    /// The source has been disposed and will never notify again.
    fn complete(&self) {}

    /// The source may be about to change. Only derived nodes send this, ahead of recomputing.
    fn mark_dirty(&self) {}
}

/// Anything that observers can subscribe to.
pub trait Observable {
    /// The type of value delivered to [`Observer::next`].
    type Value: ?Sized + 'static;

    /// Subscribes a type-erased observer.
    fn subscribe_observer(
        &self,
        observer: Rc<dyn Observer<Self::Value>>,
    ) -> Subscription;

    /// Subscribes an observer.
    fn subscribe(
        &self,
        observer: impl Observer<Self::Value> + 'static,
    ) -> Subscription
    where
        Self: Sized,
    {
        self.subscribe_observer(Rc::new(observer))
    }

    /// Returns an object with the same subscription contract as `self`.
    ///
    /// This is the interop entry point: code that accepts "something observable" calls this
    /// and subscribes to the result, without caring which kind of node it came from.
    fn observable(&self) -> Self
    where
        Self: Clone,
    {
        self.clone()
    }
}

/// An [`Observer`] assembled from closures.
///
/// ```rust
/// use reactive_cells::{graph::Callbacks, prelude::*, signal::Ref};
/// use std::{cell::Cell, rc::Rc};
///
/// let seen = Rc::new(Cell::new(0));
/// let count = Ref::new(0);
/// let _subscription = count.subscribe(Callbacks::new().on_next({
///     let seen = Rc::clone(&seen);
///     move |value: &i32| seen.set(*value)
/// }));
///
/// count.set(3);
/// assert_eq!(seen.get(), 3);
/// ```
#[allow(clippy::type_complexity)]
pub struct Callbacks<T: ?Sized> {
    next: Option<Box<dyn Fn(&T)>>,
    error: Option<Box<dyn Fn(&ReactiveError)>>,
    complete: Option<Box<dyn Fn()>>,
    dirty: Option<Box<dyn Fn()>>,
}

impl<T: ?Sized> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
            dirty: None,
        }
    }
}

impl<T: ?Sized> Debug for Callbacks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .field("dirty", &self.dirty.is_some())
            .finish()
    }
}

impl<T: ?Sized> Callbacks<T> {
    /// An observer that ignores everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback for new values.
    pub fn on_next(mut self, fun: impl Fn(&T) + 'static) -> Self {
        self.next = Some(Box::new(fun));
        self
    }

    /// Sets the callback for errors.
    pub fn on_error(mut self, fun: impl Fn(&ReactiveError) + 'static) -> Self {
        self.error = Some(Box::new(fun));
        self
    }

    /// Sets the callback for completion.
    pub fn on_complete(mut self, fun: impl Fn() + 'static) -> Self {
        self.complete = Some(Box::new(fun));
        self
    }

    /// Sets the callback for dirty notifications.
    pub fn on_dirty(mut self, fun: impl Fn() + 'static) -> Self {
        self.dirty = Some(Box::new(fun));
        self
    }
}

impl<T: ?Sized> Observer<T> for Callbacks<T> {
    fn next(&self, value: &T) {
        if let Some(next) = &self.next {
            next(value);
        }
    }

    fn error(&self, error: &ReactiveError) {
        if let Some(on_error) = &self.error {
            on_error(error);
        }
    }

    fn complete(&self) {
        if let Some(complete) = &self.complete {
            complete();
        }
    }

    fn mark_dirty(&self) {
        if let Some(dirty) = &self.dirty {
            dirty();
        }
    }
}
