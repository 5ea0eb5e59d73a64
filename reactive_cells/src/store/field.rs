use crate::{
    computed::Computed,
    error::ReactiveError,
    graph::{
        AnySource, Observable, Observer, Subscription, ToAnySource,
        TrackingContext,
    },
    signal::Ref,
    traits::{DefinedAt, GetUntracked, IsDisposed, Set, WithUntracked},
};
use std::{cell::RefCell, fmt::Debug, panic::Location, rc::Rc};

/// A single field of a store.
///
/// Until it is read reactively, a field is just its raw value (or the getter and setter it was
/// built from). Reading it while a computed value or an effect is being tracked, subscribing to
/// it, or converting it into a source *materializes* a backing node:
/// - a plain value gets a new [`Ref`] holding it,
/// - a field built from an existing [`Ref`] uses that ref,
/// - a field built from a getter and a setter gets a writable [`Computed`].
///
/// Once materialized, the backing never changes: every later read and write goes through it.
///
/// ```rust
/// use reactive_cells::{computed::Computed, prelude::*, store::StoreField};
///
/// let field = StoreField::new(1);
///
/// // untracked reads and writes go straight to the raw value
/// field.set(2);
/// assert_eq!(field.get_untracked(), 2);
/// assert!(!field.is_materialized());
///
/// let double = Computed::new({
///     let field = field.clone();
///     move || field.get() * 2
/// });
/// assert_eq!(double.get(), 4);
/// assert!(field.is_materialized());
///
/// field.set(5);
/// assert_eq!(double.get(), 10);
/// ```
pub struct StoreField<T: 'static> {
    inner: Rc<FieldInner<T>>,
}

struct FieldInner<T: 'static> {
    slot: RefCell<Slot<T>>,
    is_same: fn(&T, &T) -> bool,
    #[cfg(debug_assertions)]
    defined_at: &'static Location<'static>,
}

enum Slot<T: 'static> {
    Raw(Rc<T>),
    Accessor {
        get: Rc<dyn Fn() -> T>,
        set: Rc<dyn Fn(T)>,
    },
    Linked(Ref<T>),
    Backed(Backing<T>),
}

impl<T: 'static> Clone for Slot<T> {
    fn clone(&self) -> Self {
        match self {
            Slot::Raw(value) => Slot::Raw(Rc::clone(value)),
            Slot::Accessor { get, set } => Slot::Accessor {
                get: Rc::clone(get),
                set: Rc::clone(set),
            },
            Slot::Linked(source) => Slot::Linked(source.clone()),
            Slot::Backed(backing) => Slot::Backed(backing.clone()),
        }
    }
}

enum Backing<T: 'static> {
    Ref(Ref<T>),
    Computed(Computed<T>),
}

impl<T: 'static> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Ref(inner) => Backing::Ref(inner.clone()),
            Backing::Computed(inner) => Backing::Computed(inner.clone()),
        }
    }
}

impl<T: 'static> Backing<T> {
    fn try_with_untracked<U>(
        &self,
        fun: impl FnOnce(&T) -> U,
    ) -> Result<U, ReactiveError> {
        match self {
            Backing::Ref(inner) => inner.try_with_untracked(fun),
            Backing::Computed(inner) => inner.try_with_untracked(fun),
        }
    }

    fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        match self {
            Backing::Ref(inner) => inner.try_set(value),
            Backing::Computed(inner) => inner.try_set(value),
        }
    }

    fn is_disposed(&self) -> bool {
        match self {
            Backing::Ref(inner) => inner.is_disposed(),
            Backing::Computed(inner) => inner.is_disposed(),
        }
    }

    fn to_any_source(&self) -> AnySource {
        match self {
            Backing::Ref(inner) => inner.to_any_source(),
            Backing::Computed(inner) => inner.to_any_source(),
        }
    }

    fn subscribe_observer(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        match self {
            Backing::Ref(inner) => inner.subscribe_observer(observer),
            Backing::Computed(inner) => inner.subscribe_observer(observer),
        }
    }
}

impl<T: 'static> Clone for StoreField<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Debug for StoreField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreField")
            .field("type", &std::any::type_name::<T>())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

impl<T: 'static> PartialEq for StoreField<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Eq for StoreField<T> {}

impl<T: PartialEq + 'static> StoreField<T> {
    /// Creates a field holding a raw value.
    #[track_caller]
    pub fn new(value: T) -> Self {
        Self::from_slot(Slot::Raw(Rc::new(value)), <T as PartialEq>::eq)
    }

    /// Creates a field that reads through `get` and writes through `set`.
    ///
    /// Once materialized, the field is backed by a writable [`Computed`], so `get` is only
    /// called again when something it reads changes.
    #[track_caller]
    pub fn accessor(
        get: impl Fn() -> T + 'static,
        set: impl Fn(T) + 'static,
    ) -> Self {
        Self::from_slot(
            Slot::Accessor {
                get: Rc::new(get),
                set: Rc::new(set),
            },
            <T as PartialEq>::eq,
        )
    }

    /// Creates a field backed by an existing ref, once it is materialized. Until then, untracked
    /// reads and writes go to the ref directly.
    #[track_caller]
    pub fn from_ref(source: Ref<T>) -> Self {
        Self::from_slot(Slot::Linked(source), <T as PartialEq>::eq)
    }
}

impl<T: 'static> StoreField<T> {
    #[track_caller]
    fn from_slot(slot: Slot<T>, is_same: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Rc::new(FieldInner {
                slot: RefCell::new(slot),
                is_same,
                #[cfg(debug_assertions)]
                defined_at: Location::caller(),
            }),
        }
    }

    /// Whether a backing node has been created for this field.
    pub fn is_materialized(&self) -> bool {
        matches!(*self.inner.slot.borrow(), Slot::Backed(_))
    }

    /// Makes this field mirror `source`.
    ///
    /// A field backed by a ref keeps that ref, which starts forwarding from `source`. A field
    /// that has not been materialized yet gets a new backing ref that forwards from `source`.
    /// A field built from a getter and a setter can't forward, so `source`'s current value is
    /// written through the setter once.
    #[track_caller]
    pub fn set_ref(&self, source: &Ref<T>) -> Result<(), ReactiveError>
    where
        T: Clone,
    {
        let slot = self.inner.slot.borrow().clone();
        match slot {
            Slot::Backed(Backing::Ref(backing)) => {
                backing.forward_from(source);
                Ok(())
            }
            Slot::Backed(Backing::Computed(_)) | Slot::Accessor { .. } => {
                self.materialize().try_set(source.try_get_untracked()?)
            }
            Slot::Raw(_) | Slot::Linked(_) => {
                let backing = Ref::forwarding(source);
                *self.inner.slot.borrow_mut() =
                    Slot::Backed(Backing::Ref(backing));
                Ok(())
            }
        }
    }

    #[track_caller]
    fn materialize(&self) -> Backing<T> {
        let mut slot = self.inner.slot.borrow_mut();
        let backing = match &*slot {
            Slot::Backed(backing) => return backing.clone(),
            Slot::Raw(value) => Backing::Ref(Ref::from_shared(
                Rc::clone(value),
                self.inner.is_same,
            )),
            Slot::Accessor { get, set } => {
                let (get, set) = (Rc::clone(get), Rc::clone(set));
                Backing::Computed(Computed::new_writable_with_compare(
                    move || get(),
                    move |value| set(value),
                    self.inner.is_same,
                ))
            }
            Slot::Linked(source) => Backing::Ref(source.clone()),
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            field = std::any::type_name::<T>(),
            "materializing store field"
        );

        *slot = Slot::Backed(backing.clone());
        backing
    }
}

impl<T: 'static> DefinedAt for StoreField<T> {
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

impl<T: 'static> IsDisposed for StoreField<T> {
    fn is_disposed(&self) -> bool {
        match &*self.inner.slot.borrow() {
            Slot::Backed(backing) => backing.is_disposed(),
            Slot::Linked(source) => source.is_disposed(),
            Slot::Raw(_) | Slot::Accessor { .. } => false,
        }
    }
}

impl<T: 'static> WithUntracked for StoreField<T> {
    type Value = T;

    fn try_with_untracked<U>(
        &self,
        fun: impl FnOnce(&Self::Value) -> U,
    ) -> Result<U, ReactiveError> {
        // a reactive read is about to track this field, so it needs a source to track
        if TrackingContext::is_tracking() {
            return self.materialize().try_with_untracked(fun);
        }

        let slot = self.inner.slot.borrow().clone();
        match slot {
            Slot::Raw(value) => Ok(fun(&value)),
            Slot::Accessor { get, .. } => Ok(fun(&get())),
            Slot::Linked(source) => source.try_with_untracked(fun),
            Slot::Backed(backing) => backing.try_with_untracked(fun),
        }
    }
}

impl<T: 'static> Set for StoreField<T> {
    type Value = T;

    fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        let slot = self.inner.slot.borrow().clone();
        match slot {
            Slot::Raw(_) => {
                *self.inner.slot.borrow_mut() = Slot::Raw(Rc::new(value));
                Ok(())
            }
            Slot::Accessor { set, .. } => {
                set(value);
                Ok(())
            }
            Slot::Linked(source) => source.try_set(value),
            Slot::Backed(backing) => backing.try_set(value),
        }
    }
}

impl<T: 'static> ToAnySource for StoreField<T> {
    fn to_any_source(&self) -> AnySource {
        self.materialize().to_any_source()
    }
}

impl<T: 'static> Observable for StoreField<T> {
    type Value = T;

    fn subscribe_observer(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        self.materialize().subscribe_observer(observer)
    }
}
