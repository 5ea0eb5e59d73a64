//! A fine-grained, single-threaded reactive runtime.
//!
//! The graph is built from four kinds of nodes:
//! 1. **Refs** ([`signal::Ref`]): atomic cells of state, which can be directly mutated.
//! 2. **Computed values** ([`computed::Computed`]): memoized values derived from other nodes,
//!    recomputed lazily and only when one of their dependencies has actually changed.
//! 3. **Effects** ([`effect::Effect`]): side effects that re-run when anything they read changes.
//! 4. **Scopes** ([`scope::Scope`]): an ownership tree that tears effects and nested scopes down
//!    in a fixed order.
//!
//! [`store`] builds on top of refs to give each field of a struct (or each key of a map) its own
//! lazily created ref.
//!
//! ```rust
//! use microtask_queue::Microtasks;
//! use reactive_cells::{
//!     computed::Computed, effect::Effect, prelude::*, signal::Ref,
//! };
//! use std::{cell::RefCell, rc::Rc};
//!
//! let count = Ref::new(1);
//! let double_count = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! // the effect runs once immediately
//! let _effect = Effect::new({
//!     let log = Rc::clone(&log);
//!     move || log.borrow_mut().push(double_count.get())
//! });
//!
//! // setting a ref is synchronous, but re-running the effect is deferred
//! count.set(2);
//! count.set(3);
//! assert_eq!(*log.borrow(), [2]);
//!
//! Microtasks::flush();
//! assert_eq!(*log.borrow(), [2, 6]);
//! ```
//!
//! ## Design Principles
//! - **Refs are hot, everything else is deferred.** Setting a ref notifies its subscribers in the
//!   same call. Computed values and effects only mark themselves (and everything downstream of
//!   them) stale, and schedule their recomputation on the [`microtask_queue`]. A burst of writes
//!   therefore produces one recomputation per affected node.
//! - **No glitches.** Staleness reaches every transitive dependent before any recomputation runs,
//!   and a node checks that its dependencies really changed before re-running, so no node ever
//!   sees a half-updated graph.
//! - **Automatic dependency tracking.** Dependencies are recorded at runtime, every time a node
//!   is evaluated, so a branch that isn't taken doesn't cause re-runs.
//! - **Single-threaded.** Nodes are reference counted with [`Rc`](std::rc::Rc) and are not
//!   `Send`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::fmt::Arguments;

pub mod cancel;
pub mod computed;
pub mod effect;
mod error;
pub mod graph;
pub mod scope;
pub mod signal;
pub mod store;
pub mod traits;

pub use error::ReactiveError;

/// Reexports frequently-used traits.
pub mod prelude {
    pub use crate::{
        cancel::CancellationToken,
        graph::Observable,
        store::{IntoStore, Store},
        traits::*,
    };
}

#[doc(hidden)]
pub fn log_warning(text: Arguments) {
    #[cfg(feature = "tracing")]
    {
        tracing::warn!("{text}");
    }
    #[cfg(not(feature = "tracing"))]
    {
        eprintln!("{text}");
    }
}
