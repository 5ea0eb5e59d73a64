//! The plumbing of the reactive graph: subscriber lists, observer contracts, type-erased sources
//! and subscribers, and the dependency-tracking stack.

mod observer;
mod registry;
mod source;
mod subscriber;
mod tracking;

pub use observer::*;
pub use registry::*;
pub use source::*;
pub use subscriber::*;
pub use tracking::*;

use std::cell::Cell;

thread_local! {
    static WRITES: Cell<u64> = const { Cell::new(0) };
}

/// Counts the changes made to every ref on this thread.
pub(crate) fn write_epoch() -> u64 {
    WRITES.get()
}

pub(crate) fn bump_write_epoch() {
    WRITES.set(WRITES.get().wrapping_add(1));
}

/// Whether a derived node's cached value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactiveNodeState {
    /// The cached value is current.
    Clean,
    /// Never computed, or a dependency has changed since the last computation.
    Dirty,
    /// The last computation failed. The getter runs again once any ref has changed, whatever the
    /// recorded dependencies say.
    Failed,
}
