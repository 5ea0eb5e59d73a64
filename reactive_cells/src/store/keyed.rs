use super::{IntoStore, Store, StoreField};
use crate::{
    error::ReactiveError,
    graph::{Observable, Observer, Registry, Subscription},
    signal::Ref,
    traits::{DefinedAt, Get, GetUntracked, Set, Track},
};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::{cell::RefCell, fmt::Debug, hash::Hash, panic::Location, rc::Rc};

/// A store over a record whose keys are only known at runtime.
///
/// Every key gets its own lazily materialized [`StoreField`], kept in insertion order. Keys are
/// never removed, so a field handle obtained once stays the field for that key.
///
/// Reading a key that isn't there, or reading the set of keys, tracks the *shape* of the store:
/// a reactive reader is notified when a new key is added.
///
/// The store is itself observable, as the stream of keys that are written to.
///
/// ```rust
/// use reactive_cells::{computed::Computed, prelude::*, store::KeyedStore};
///
/// let scores: KeyedStore<&str, u32> = [("ann", 3), ("bob", 5)].into_iter().collect();
/// let total = Computed::new({
///     let scores = scores.clone();
///     move || {
///         scores
///             .keys()
///             .iter()
///             .filter_map(|name| scores.get(name))
///             .sum::<u32>()
///     }
/// });
/// assert_eq!(total.get(), 8);
///
/// scores.set("bob", 6);
/// assert_eq!(total.get(), 9);
///
/// scores.set("cat", 1);
/// assert_eq!(total.get(), 10);
/// ```
pub struct KeyedStore<K: 'static, V: 'static> {
    inner: Rc<KeyedInner<K, V>>,
}

struct KeyedInner<K: 'static, V: 'static> {
    fields: RefCell<IndexMap<K, StoreField<V>, FxBuildHasher>>,
    shape: Ref<usize>,
    writes: Registry<K>,
    #[cfg(debug_assertions)]
    defined_at: &'static Location<'static>,
}

impl<K: 'static, V: 'static> Clone for KeyedStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: Debug + 'static, V: 'static> Debug for KeyedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStore")
            .field("keys", &self.inner.fields.borrow().keys())
            .finish()
    }
}

impl<K: 'static, V: 'static> PartialEq for KeyedStore<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K: 'static, V: 'static> Eq for KeyedStore<K, V> {}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: PartialEq + 'static,
{
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedStore<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: PartialEq + 'static,
{
    /// Creates an empty store.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    #[track_caller]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(KeyedInner {
                fields: RefCell::new(IndexMap::default()),
                shape: Ref::new(0),
                writes: Registry::new(),
                #[cfg(debug_assertions)]
                defined_at: Location::caller(),
            }),
        }
    }

    /// The field for `key`, if the key exists. Does not track anything.
    pub fn field(&self, key: &K) -> Option<StoreField<V>> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Reads the value of `key`, tracking that field, or the shape of the store if the key
    /// doesn't exist yet.
    pub fn try_get(&self, key: &K) -> Result<Option<V>, ReactiveError>
    where
        V: Clone,
    {
        match self.field(key) {
            Some(field) => field.try_get().map(Some),
            None => {
                self.inner.shape.track();
                Ok(None)
            }
        }
    }

    /// Reads the value of `key`, tracking that field, or the shape of the store if the key
    /// doesn't exist yet.
    #[track_caller]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.field(key).map(|field| field.get()).or_else(|| {
            self.inner.shape.track();
            None
        })
    }

    /// Reads the value of `key` without tracking anything.
    #[track_caller]
    pub fn get_untracked(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.field(key).map(|field| field.get_untracked())
    }

    /// Writes `value` to `key`, adding the key if it is new, and tells the store's observers
    /// which key was written.
    #[track_caller]
    pub fn set(&self, key: K, value: V) {
        match self.field(&key) {
            Some(field) => field.set(value),
            None => self.insert(key.clone(), StoreField::new(value)),
        }
        self.inner.writes.notify_next(&key);
    }

    /// Makes `key` mirror `source`, adding the key if it is new.
    #[track_caller]
    pub fn set_ref(&self, key: K, source: &Ref<V>) -> Result<(), ReactiveError>
    where
        V: Clone,
    {
        match self.field(&key) {
            Some(field) => field.set_ref(source)?,
            None => self.insert(
                key.clone(),
                StoreField::from_ref(Ref::forwarding(source)),
            ),
        }
        self.inner.writes.notify_next(&key);
        Ok(())
    }

    fn insert(&self, key: K, field: StoreField<V>) {
        let len = {
            let mut fields = self.inner.fields.borrow_mut();
            fields.insert(key, field);
            fields.len()
        };
        self.inner.shape.set(len);
    }

    /// Whether `key` exists, tracking the shape of the store.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.shape.track();
        self.inner.fields.borrow().contains_key(key)
    }

    /// The keys, in insertion order, tracking the shape of the store.
    pub fn keys(&self) -> Vec<K> {
        self.inner.shape.track();
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// The number of keys, tracking the shape of the store.
    pub fn len(&self) -> usize {
        self.inner.shape.get()
    }

    /// Whether the store has no keys, tracking the shape of the store.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> FromIterator<(K, V)> for KeyedStore<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: PartialEq + 'static,
{
    #[track_caller]
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let this = Self::new();
        {
            let mut fields = this.inner.fields.borrow_mut();
            for (key, value) in iter {
                fields.insert(key, StoreField::new(value));
            }
        }
        let len = this.inner.fields.borrow().len();
        this.inner.shape.set(len);
        this
    }
}

impl<K: 'static, V: 'static> DefinedAt for KeyedStore<K, V> {
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

impl<K: 'static, V: 'static> Observable for KeyedStore<K, V> {
    type Value = K;

    fn subscribe_observer(&self, observer: Rc<dyn Observer<K>>) -> Subscription {
        self.inner.writes.subscribe(observer)
    }
}

impl<K, V> Store for KeyedStore<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: PartialEq + Clone + 'static,
{
    type Model = IndexMap<K, V>;

    fn snapshot(&self) -> Self::Model {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|(key, field)| (key.clone(), field.get_untracked()))
            .collect()
    }

    /// Writes every entry of `model`. Keys that are missing from `model` keep their values.
    fn replace(&self, model: Self::Model) {
        for (key, value) in model {
            self.set(key, value);
        }
    }
}

impl<K, V> IntoStore for IndexMap<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: PartialEq + Clone + 'static,
{
    type Store = KeyedStore<K, V>;

    #[track_caller]
    fn into_store(self) -> Self::Store {
        self.into_iter().collect()
    }
}
