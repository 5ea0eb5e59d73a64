//! A series of traits to implement the behavior of reactive primitives.
//!
//! ## Principles
//! 1. **Composition**: Most of the traits are implemented as combinations of more primitive base
//!    traits, and blanket implemented for all types that implement those traits.
//! 2. **Fallibility**: Most traits include a `try_` variant, which returns a [`ReactiveError`] if
//!    the method fails (e.g., if a computed value's getter failed, or it has no setter). The
//!    plain variant panics with that error.
//!
//! ## Metadata Traits
//! - [`DefinedAt`] is used for debugging in the case of errors and should be implemented for all
//!   reactive types.
//! - [`IsDisposed`] checks whether a node has been permanently detached.
//!
//! ## Base Traits
//! | Trait             | Mode          | Description                                                          |
//! |-------------------|---------------|----------------------------------------------------------------------|
//! | [`Track`]         |               | Records this value as a dependency of the active tracking context. |
//! | [`WithUntracked`] | `fn(&T) -> U` | Applies a closure to the current value, without tracking.           |
//! | [`Set`]           | `T`           | Replaces the value and notifies subscribers.                         |
//! | [`Dispose`]       |               | Permanently detaches the node.                                       |
//!
//! ## Derived Traits
//! | Trait            | Mode          | Composition                   | Description
//! |------------------|---------------|-------------------------------|------------
//! | [`With`]         | `fn(&T) -> U` | [`WithUntracked`] + [`Track`] | Applies a closure to the current value, with tracking.
//! | [`GetUntracked`] | `T`           | [`WithUntracked`] + [`Clone`] | Clones the current value.
//! | [`Get`]          | `T`           | [`With`] + [`Clone`]          | Clones the current value, with tracking.
//! | [`Update`]       | `fn(&mut T)`  | [`WithUntracked`] + [`Set`]   | Modifies a copy of the current value and sets it.

use crate::{
    error::ReactiveError,
    graph::{ToAnySource, TrackingContext},
};
use std::panic::Location;

#[doc(hidden)]
#[track_caller]
pub fn panic_with_error(
    defined_at: Option<&'static Location<'static>>,
    error: ReactiveError,
) -> ! {
    let location = Location::caller();
    match defined_at {
        Some(defined_at) => panic!(
            "At {location}, a reactive value defined at {defined_at} failed: \
             {error}"
        ),
        None => panic!("At {location}, a reactive value failed: {error}"),
    }
}

/// Where the reactive node was created, in debug builds.
pub trait DefinedAt {
    /// Returns the location at which the node was defined, if available.
    fn defined_at(&self) -> Option<&'static Location<'static>>;
}

/// Whether the node has been permanently detached.
pub trait IsDisposed {
    /// Returns `true` once the node has been disposed.
    fn is_disposed(&self) -> bool;
}

/// Permanently detaches a node from the reactive graph.
pub trait Dispose {
    /// Disposes the node. Calling this more than once has no further effect.
    fn dispose(&self);
}

/// Records a node as a dependency of whatever is currently being tracked.
pub trait Track {
    /// Tracks this value, if a tracking context is active.
    fn track(&self);
}

impl<T: ToAnySource + IsDisposed> Track for T {
    fn track(&self) {
        if !self.is_disposed() && TrackingContext::is_tracking() {
            TrackingContext::track(self.to_any_source());
        }
    }
}

/// Gives access to the current value without tracking it.
pub trait WithUntracked: DefinedAt {
    /// The type of the value.
    type Value: ?Sized;

    /// Applies `fun` to the current value.
    fn try_with_untracked<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> Result<U, ReactiveError>;

    /// Applies `fun` to the current value, panicking if it cannot be produced.
    #[track_caller]
    fn with_untracked<U>(&self, fun: impl FnOnce(&Self::Value) -> U) -> U {
        match self.try_with_untracked(fun) {
            Ok(value) => value,
            Err(error) => panic_with_error(self.defined_at(), error),
        }
    }
}

/// Gives access to the current value, tracking it.
pub trait With: DefinedAt {
    /// The type of the value.
    type Value: ?Sized;

    /// Applies `fun` to the current value.
    fn try_with<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> Result<U, ReactiveError>;

    /// Applies `fun` to the current value, panicking if it cannot be produced.
    #[track_caller]
    fn with<U>(&self, fun: impl FnOnce(&Self::Value) -> U) -> U {
        match self.try_with(fun) {
            Ok(value) => value,
            Err(error) => panic_with_error(self.defined_at(), error),
        }
    }
}

impl<T> With for T
where
    T: WithUntracked + Track,
{
    type Value = <T as WithUntracked>::Value;

    fn try_with<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> Result<U, ReactiveError> {
        // resolve first, so the edge records the version that was actually read
        let value = self.try_with_untracked(fun);
        self.track();
        value
    }
}

/// Clones the current value without tracking it.
pub trait GetUntracked: DefinedAt {
    /// The type of the value.
    type Value;

    /// Clones the current value.
    fn try_get_untracked(&self) -> Result<Self::Value, ReactiveError>;

    /// Clones the current value, panicking if it cannot be produced.
    #[track_caller]
    fn get_untracked(&self) -> Self::Value {
        match self.try_get_untracked() {
            Ok(value) => value,
            Err(error) => panic_with_error(self.defined_at(), error),
        }
    }
}

impl<T> GetUntracked for T
where
    T: WithUntracked,
    T::Value: Clone,
{
    type Value = <Self as WithUntracked>::Value;

    fn try_get_untracked(&self) -> Result<Self::Value, ReactiveError> {
        self.try_with_untracked(Self::Value::clone)
    }
}

/// Clones the current value, tracking it.
pub trait Get: DefinedAt {
    /// The type of the value.
    type Value: Clone;

    /// Clones the current value.
    fn try_get(&self) -> Result<Self::Value, ReactiveError>;

    /// Clones the current value, panicking if it cannot be produced.
    #[track_caller]
    fn get(&self) -> Self::Value {
        match self.try_get() {
            Ok(value) => value,
            Err(error) => panic_with_error(self.defined_at(), error),
        }
    }
}

impl<T> Get for T
where
    T: With,
    T::Value: Clone,
{
    type Value = <T as With>::Value;

    fn try_get(&self) -> Result<Self::Value, ReactiveError> {
        self.try_with(Self::Value::clone)
    }
}

/// Replaces the current value.
pub trait Set: DefinedAt {
    /// The type of value accepted.
    type Value;

    /// Sets the value, notifying subscribers if it changed.
    fn try_set(&self, value: Self::Value) -> Result<(), ReactiveError>;

    /// Sets the value, panicking if this node cannot be set.
    #[track_caller]
    fn set(&self, value: Self::Value) {
        if let Err(error) = self.try_set(value) {
            panic_with_error(self.defined_at(), error);
        }
    }
}

/// Modifies the current value in place.
pub trait Update: Set {
    /// Applies `fun` to a copy of the current value, then sets it.
    fn try_update<U>(
        &self,
        fun: impl FnOnce(&mut <Self as Set>::Value) -> U,
    ) -> Result<U, ReactiveError>;

    /// Applies `fun` to a copy of the current value, then sets it, panicking on failure.
    #[track_caller]
    fn update(&self, fun: impl FnOnce(&mut <Self as Set>::Value)) {
        if let Err(error) = self.try_update(fun) {
            panic_with_error(self.defined_at(), error);
        }
    }
}

impl<T> Update for T
where
    T: Set + WithUntracked<Value = <T as Set>::Value>,
    <T as Set>::Value: Clone,
{
    fn try_update<U>(
        &self,
        fun: impl FnOnce(&mut <Self as Set>::Value) -> U,
    ) -> Result<U, ReactiveError> {
        let mut value: <Self as Set>::Value =
            self.try_with_untracked(|value| value.clone())?;
        let output = fun(&mut value);
        self.try_set(value)?;
        Ok(output)
    }
}
