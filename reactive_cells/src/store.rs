//! Records whose fields become reactive one at a time, the first time they are read reactively.
//!
//! A store wraps a plain value and gives each of its fields a [`StoreField`]. A field starts out
//! as the raw value, with no reactive machinery attached. The first time it is read inside a
//! computed value or an effect (or subscribed to), it *materializes* a backing [`Ref`]; from
//! then on, every read and write of that field goes through the same ref, for as long as the
//! store lives. Fields that are never read reactively are never instrumented.
//!
//! Typed stores are generated with `#[derive(Store)]`:
//!
//! ```rust
//! use microtask_queue::Microtasks;
//! use reactive_cells::{effect::Effect, prelude::*};
//! use std::{cell::RefCell, rc::Rc};
//!
//! #[derive(Store, Clone, Debug, PartialEq)]
//! struct Counter {
//!     count: i32,
//!     label: String,
//! }
//!
//! let store = Counter {
//!     count: 0,
//!     label: "clicks".into(),
//! }
//! .into_store();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! Effect::new({
//!     let store = store.clone();
//!     let log = Rc::clone(&log);
//!     move || log.borrow_mut().push(store.count().get())
//! });
//!
//! // `count` was read by the effect, `label` never was
//! assert!(store.count().is_materialized());
//! assert!(!store.label().is_materialized());
//!
//! store.count().set(1);
//! Microtasks::flush();
//! assert_eq!(*log.borrow(), [0, 1]);
//!
//! assert_eq!(
//!     store.snapshot(),
//!     Counter {
//!         count: 1,
//!         label: "clicks".into()
//!     }
//! );
//! ```
//!
//! A field marked `#[store(nested)]` holds the store of its own type, so the nested record's
//! fields are instrumented lazily in the same way. [`KeyedStore`] covers records whose keys are
//! only known at runtime.
//!
//! [`Ref`]: crate::signal::Ref

mod field;
mod keyed;

pub use field::StoreField;
pub use keyed::KeyedStore;
#[cfg(feature = "derive")]
pub use reactive_cells_macro::Store;

/// A reactive wrapper around a plain record.
///
/// Store handles are cheap to clone, and compare equal when they wrap the same record.
pub trait Store: Clone + PartialEq + 'static {
    /// The plain record type this store wraps.
    type Model: IntoStore<Store = Self>;

    /// Reads every field, without tracking, into a new plain record.
    fn snapshot(&self) -> Self::Model;

    /// Writes every field of `model` into the store, notifying the subscribers of each field
    /// that changed.
    fn replace(&self, model: Self::Model);
}

/// Converts a plain record into its store.
pub trait IntoStore: Sized {
    /// The store for this record.
    type Store: Store<Model = Self>;

    /// Wraps the record in a store.
    fn into_store(self) -> Self::Store;
}
