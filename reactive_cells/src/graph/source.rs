use super::{AnySubscriber, Subscription};
use crate::traits::DefinedAt;
use core::{fmt::Debug, hash::Hash};
use std::{panic::Location, rc::Weak};

/// Converts a [`Source`] to a type-erased [`AnySource`].
pub trait ToAnySource {
    /// Converts this type to its type-erased equivalent.
    fn to_any_source(&self) -> AnySource;
}

/// Describes the behavior of any source of reactivity (like a ref or a computed value).
pub trait Source {
    /// Subscribes a tracking subscriber to this source.
    fn add_subscriber(&self, subscriber: AnySubscriber) -> Subscription;

    /// Bumped every time the source's value actually changes.
    fn version(&self) -> u64;

    /// Whether the source's value is known to be stale.
    fn is_dirty(&self) -> bool;

    /// Brings a stale source up to date. Failures are reported through the source's own
    /// subscribers, not returned.
    fn update_if_necessary(&self);
}

/// A type-erased, weak handle to a source.
#[derive(Clone)]
pub struct AnySource(
    pub(crate) usize,
    pub(crate) Weak<dyn Source>,
    #[cfg(debug_assertions)] pub(crate) &'static Location<'static>,
);

impl AnySource {
    /// Whether the source has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.1.strong_count() == 0
    }
}

impl DefinedAt for AnySource {
    fn defined_at(&self) -> Option<&'static Location<'static>> {
        #[cfg(debug_assertions)]
        {
            Some(self.2)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}

impl Debug for AnySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnySource").field(&self.0).finish()
    }
}

impl Hash for AnySource {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialEq for AnySource {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for AnySource {}

impl ToAnySource for AnySource {
    fn to_any_source(&self) -> AnySource {
        self.clone()
    }
}

impl Source for AnySource {
    fn add_subscriber(&self, subscriber: AnySubscriber) -> Subscription {
        match self.1.upgrade() {
            Some(inner) => inner.add_subscriber(subscriber),
            None => Subscription::closed(),
        }
    }

    fn version(&self) -> u64 {
        self.1.upgrade().map(|inner| inner.version()).unwrap_or_default()
    }

    fn is_dirty(&self) -> bool {
        self.1.upgrade().is_some_and(|inner| inner.is_dirty())
    }

    fn update_if_necessary(&self) {
        if let Some(inner) = self.1.upgrade() {
            inner.update_if_necessary();
        }
    }
}
