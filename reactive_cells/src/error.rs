//! Errors produced by reactive nodes.

use std::{any::Any, error::Error, panic::Location, rc::Rc};
use thiserror::Error;

/// The single error kind that flows through the reactive graph.
///
/// Failures inside a getter (whether returned or panicked) are normalized into this type before
/// they are handed to observers, so that every subscriber sees the same value.
#[derive(Debug, Clone, Error)]
pub enum ReactiveError {
    /// Tried to set a computed value that was created without a setter.
    #[error("{}", read_only_message(.defined_at))]
    ReadOnly {
        /// Where the computed value was created, in debug builds.
        defined_at: Option<&'static Location<'static>>,
    },
    /// A fallible getter returned an error.
    #[error("computation failed: {0}")]
    Computation(Rc<dyn Error>),
    /// A getter panicked.
    #[error("computation panicked: {0}")]
    Panicked(Rc<str>),
    /// A computed value was read while it was already being computed.
    #[error("cycle detected: a computed value read itself while computing")]
    Cycle,
    /// The node has been disposed and has no value to give.
    #[error("tried to access a reactive value that has already been disposed")]
    Disposed,
}

impl ReactiveError {
    /// Wraps any error returned by a getter.
    pub fn computation(error: impl Error + 'static) -> Self {
        Self::Computation(Rc::new(error))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            Rc::from(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Rc::from(message.as_str())
        } else {
            Rc::from("Box<dyn Any>")
        };
        Self::Panicked(message)
    }
}

fn read_only_message(defined_at: &Option<&'static Location<'static>>) -> String {
    match defined_at {
        Some(location) => format!(
            "cannot set the computed value defined at {location}: it was \
             created without a setter"
        ),
        None => String::from(
            "cannot set a computed value that was created without a setter",
        ),
    }
}
