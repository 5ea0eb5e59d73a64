use indexmap::IndexMap;
use microtask_queue::Microtasks;
use reactive_cells::{
    computed::Computed,
    effect::Effect,
    graph::{Callbacks, ToAnySource},
    prelude::*,
    signal::Ref,
    store::{KeyedStore, StoreField},
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

#[derive(Store, Clone, Debug, PartialEq)]
struct Todo {
    title: String,
    done: bool,
}

#[derive(Store, Clone, Debug, PartialEq)]
struct TodoList {
    owner: String,
    #[store(nested)]
    featured: Todo,
    count: usize,
}

#[derive(Store, Clone, Debug, PartialEq)]
struct Point(i32, i32);

fn todo() -> Todo {
    Todo {
        title: String::from("write tests"),
        done: false,
    }
}

#[test]
fn store_identity_is_stable() {
    let store = todo().into_store();
    let before = store.clone();

    store.done().set(true);
    assert!(store.done().get());
    assert_eq!(store, before);
    assert!(before.done().get_untracked());

    // a field handle is the same field every time
    assert_eq!(*store.title(), *before.title());
}

#[test]
fn fields_are_instrumented_lazily() {
    let store = todo().into_store();
    assert_eq!(store.title().get_untracked(), "write tests");
    assert!(!store.title().is_materialized());

    // untracked writes go straight to the raw value
    store.title().set(String::from("write more tests"));
    assert!(!store.title().is_materialized());

    let title_len = Computed::new({
        let store = store.clone();
        move || store.title().with(String::len)
    });
    assert_eq!(title_len.get(), 16);
    assert!(store.title().is_materialized());
    assert!(!store.done().is_materialized());
}

#[test]
fn materialized_field_keeps_its_ref() {
    let store = todo().into_store();
    let runs = Rc::new(Cell::new(0));
    let _effect = Effect::new({
        let store = store.clone();
        let runs = Rc::clone(&runs);
        move || {
            store.done().track();
            runs.set(runs.get() + 1);
        }
    });

    let source = store.done().to_any_source();
    store.done().set(true);
    Microtasks::flush();
    assert_eq!(runs.get(), 2);
    assert_eq!(store.done().to_any_source(), source);

    // writing an equal value is still a no-op
    store.done().set(true);
    Microtasks::flush();
    assert_eq!(runs.get(), 2);
}

#[test]
fn nested_store_fields() {
    let list = TodoList {
        owner: String::from("ann"),
        featured: todo(),
        count: 1,
    }
    .into_store();

    let featured = list.featured().clone();
    assert!(!featured.done().is_materialized());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let _effect = Effect::new({
        let list = list.clone();
        let seen = Rc::clone(&seen);
        move || seen.borrow_mut().push(list.featured().done().get())
    });

    featured.done().set(true);
    Microtasks::flush();
    assert_eq!(*seen.borrow(), [false, true]);
    assert!(!list.owner().is_materialized());
}

#[test]
fn snapshot_and_replace() {
    let list = TodoList {
        owner: String::from("ann"),
        featured: todo(),
        count: 1,
    }
    .into_store();
    list.count().set(2);
    list.featured().title().set(String::from("ship it"));

    let snapshot = list.snapshot();
    assert_eq!(snapshot.count, 2);
    assert_eq!(snapshot.featured.title, "ship it");

    let notified = Rc::new(Cell::new(0));
    let _sub = list.count().subscribe(Callbacks::new().on_next({
        let notified = Rc::clone(&notified);
        move |_: &usize| notified.set(notified.get() + 1)
    }));

    list.replace(TodoList {
        owner: String::from("bob"),
        featured: snapshot.featured.clone(),
        count: 2,
    });
    assert_eq!(list.owner().get_untracked(), "bob");
    // `count` did not change, so its subscriber heard nothing
    assert_eq!(notified.get(), 0);
}

#[test]
fn tuple_struct_store() {
    let point = Point(1, 2).into_store();
    point.field0().set(5);
    assert_eq!(point.field1().get(), 2);
    assert_eq!(point.snapshot(), Point(5, 2));
}

#[test]
fn field_from_ref_uses_that_ref() {
    let source = Ref::new(1);
    let field = StoreField::from_ref(source.clone());

    // untracked writes reach the ref directly
    field.set(2);
    assert_eq!(source.get(), 2);

    let doubled = Computed::new({
        let field = field.clone();
        move || field.get() * 2
    });
    assert_eq!(doubled.get(), 4);
    assert_eq!(field.to_any_source(), source.to_any_source());

    source.set(3);
    assert_eq!(doubled.get(), 6);
}

#[test]
fn accessor_field() {
    let backing = Ref::new(10);
    let field = StoreField::accessor(
        {
            let backing = backing.clone();
            move || backing.get() / 10
        },
        {
            let backing = backing.clone();
            move |tens: i32| backing.set(tens * 10)
        },
    );
    assert_eq!(field.get_untracked(), 1);

    field.set(3);
    assert_eq!(backing.get(), 30);

    let plus_one = Computed::new({
        let field = field.clone();
        move || field.get() + 1
    });
    assert_eq!(plus_one.get(), 4);
    assert!(field.is_materialized());

    backing.set(50);
    assert_eq!(plus_one.get(), 6);
}

#[test]
fn set_ref_forwards() {
    let store = todo().into_store();
    let external = Ref::new(String::from("from outside"));

    store.title().set_ref(&external).unwrap();
    assert!(store.title().is_materialized());
    assert_eq!(store.title().get(), "from outside");

    external.set(String::from("changed outside"));
    assert_eq!(store.title().get(), "changed outside");

    // a direct write severs the link
    store.title().set(String::from("mine"));
    external.set(String::from("ignored"));
    assert_eq!(store.title().get(), "mine");
}

#[test]
fn keyed_store_tracks_fields_and_shape() {
    let scores: KeyedStore<String, u32> = KeyedStore::new();
    scores.set(String::from("ann"), 1);

    let total_runs = Rc::new(Cell::new(0));
    let total = Computed::new({
        let scores = scores.clone();
        let runs = Rc::clone(&total_runs);
        move || {
            runs.set(runs.get() + 1);
            scores
                .keys()
                .iter()
                .filter_map(|key| scores.get(key))
                .sum::<u32>()
        }
    });
    let _sub = total.subscribe(Callbacks::new());
    assert_eq!(total.get(), 1);

    scores.set(String::from("ann"), 4);
    Microtasks::flush();
    assert_eq!(total.get(), 4);

    scores.set(String::from("bob"), 2);
    Microtasks::flush();
    assert_eq!(total.get(), 6);
    assert_eq!(total_runs.get(), 3);

    assert_eq!(scores.len(), 2);
    assert!(scores.contains_key(&String::from("bob")));
}

#[test]
fn keyed_store_missing_key_waits_for_insertion() {
    let flags: KeyedStore<&str, bool> = KeyedStore::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _effect = Effect::new({
        let flags = flags.clone();
        let seen = Rc::clone(&seen);
        move || seen.borrow_mut().push(flags.get(&"beta"))
    });

    flags.set("alpha", true);
    Microtasks::flush();
    flags.set("beta", true);
    Microtasks::flush();

    assert_eq!(*seen.borrow(), [None, None, Some(true)]);
}

#[test]
fn keyed_store_is_observable_as_written_keys() {
    let store: KeyedStore<&str, i32> =
        [("a", 1), ("b", 2)].into_iter().collect();
    let written = Rc::new(RefCell::new(Vec::new()));
    let _sub = store.subscribe(Callbacks::new().on_next({
        let written = Rc::clone(&written);
        move |key: &&str| written.borrow_mut().push(*key)
    }));

    store.set("b", 3);
    store.set("c", 4);
    assert_eq!(*written.borrow(), ["b", "c"]);

    let field = store.field(&"b").unwrap();
    store.set("b", 5);
    assert_eq!(field.get_untracked(), 5);
}

#[test]
fn keyed_store_round_trip_through_index_map() {
    let mut model = IndexMap::new();
    model.insert("x", 1);
    model.insert("y", 2);

    let store = model.clone().into_store();
    assert_eq!(store.keys(), ["x", "y"]);
    assert_eq!(store.snapshot(), model);

    let source = Ref::new(9);
    store.set_ref("z", &source).unwrap();
    source.set(10);
    assert_eq!(store.get_untracked(&"z"), Some(10));
}
