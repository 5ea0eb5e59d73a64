use super::Observer;
use core::{fmt::Debug, hash::Hash};
use std::rc::Weak;

/// Converts a [`Subscriber`] to a type-erased [`AnySubscriber`].
pub trait ToAnySubscriber {
    /// Converts this type to its type-erased equivalent.
    fn to_any_subscriber(&self) -> AnySubscriber;
}

/// Any type that can track reactive values (like an effect or a computed value).
pub trait Subscriber {
    /// One of this subscriber's sources has changed, or is about to.
    fn mark_dirty(&self);
}

/// A type-erased, weak handle to a subscriber.
///
/// This is the observer that tracking installs on every source read during an evaluation: both
/// new values and dirty notifications from the source are forwarded to
/// [`Subscriber::mark_dirty`].
#[derive(Clone)]
pub struct AnySubscriber(pub usize, pub Weak<dyn Subscriber>);

impl ToAnySubscriber for AnySubscriber {
    fn to_any_subscriber(&self) -> AnySubscriber {
        self.clone()
    }
}

impl Subscriber for AnySubscriber {
    fn mark_dirty(&self) {
        if let Some(inner) = self.1.upgrade() {
            inner.mark_dirty();
        }
    }
}

impl<T: ?Sized> Observer<T> for AnySubscriber {
    fn next(&self, _value: &T) {
        Subscriber::mark_dirty(self);
    }

    fn mark_dirty(&self) {
        Subscriber::mark_dirty(self);
    }
}

impl Debug for AnySubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnySubscriber").field(&self.0).finish()
    }
}

impl Hash for AnySubscriber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialEq for AnySubscriber {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for AnySubscriber {}
