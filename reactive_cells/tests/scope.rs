use reactive_cells::{
    graph::{Callbacks, Observer, Registry, Subscription},
    prelude::*,
    scope::{on_cleanup, Scope},
    signal::Ref,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn on_dispose_log(scope: &Scope, log: &Log, name: &'static str) {
    scope.on_dispose({
        let log = Rc::clone(log);
        move || log.borrow_mut().push(name)
    });
}

#[test]
fn disposal_runs_children_first_in_creation_order() {
    let log: Log = Rc::default();
    let root = Scope::detached();
    root.run(|| {
        let a = Scope::new();
        a.run(|| {
            let a1 = Scope::new();
            on_dispose_log(&a1, &log, "A1");
        });
        on_dispose_log(&a, &log, "A");

        let b = Scope::new();
        on_dispose_log(&b, &log, "B");
    });
    on_dispose_log(&root, &log, "root");

    root.dispose();
    root.dispose();
    assert_eq!(*log.borrow(), ["A1", "A", "B", "root"]);
}

#[test]
fn cleanups_run_in_registration_order() {
    let log: Log = Rc::default();
    let scope = Scope::detached();
    scope.run(|| {
        let log = Rc::clone(&log);
        on_cleanup(move || log.borrow_mut().push("first"));
    });
    on_dispose_log(&scope, &log, "second");

    scope.dispose();
    assert_eq!(*log.borrow(), ["first", "second"]);
}

#[test]
fn disposed_child_leaves_its_parent() {
    let parent = Scope::detached();
    let first = Scope::with_parent(&parent);
    let second = Scope::with_parent(&parent);
    let third = Scope::with_parent(&parent);
    assert_eq!(first.parent(), Some(parent.clone()));

    second.dispose();
    assert_eq!(parent.children(), [first.clone(), third.clone()]);
    assert_eq!(second.parent(), None);
    assert!(!parent.is_disposed());
}

#[test]
fn current_scope_is_restored() {
    assert!(Scope::current().is_none());

    let outer = Scope::detached();
    outer.run(|| {
        assert_eq!(Scope::current(), Some(outer.clone()));
        let inner = Scope::new();
        inner.run(|| assert_eq!(Scope::current(), Some(inner.clone())));
        assert_eq!(Scope::current(), Some(outer.clone()));
    });
    assert!(Scope::current().is_none());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        outer.run(|| panic!("inside a scope"))
    }));
    assert!(result.is_err());
    assert!(Scope::current().is_none());
}

#[test]
fn detached_scope_ignores_the_current_one() {
    let outer = Scope::detached();
    let detached = outer.run(Scope::detached);
    assert!(detached.parent().is_none());
    assert!(outer.children().is_empty());
}

#[test]
fn scope_under_a_disposed_parent_is_born_disposed() {
    let parent = Scope::detached();
    parent.dispose();

    let child = Scope::with_parent(&parent);
    assert!(child.is_disposed());
    assert!(parent.children().is_empty());

    // callbacks registered on a disposed scope run right away
    let ran = Rc::new(Cell::new(false));
    child.on_dispose({
        let ran = Rc::clone(&ran);
        move || ran.set(true)
    });
    assert!(ran.get());
}

#[test]
fn observe_records_each_source_once() {
    let scope = Scope::detached();
    let a = Ref::new(1);
    let b = Ref::new(2);

    scope.observe(&a);
    scope.observe(&b);
    scope.observe(&a);
    let observed = scope.observables();
    assert_eq!(observed.len(), 2);
    assert!(observed[0].is(&a));
    assert!(observed[1].is(&b));
    assert!(!observed[0].is(&b));

    scope.dispose();
    scope.observe(&a);
    assert!(scope.observables().is_empty());
}

/// An observable that lives outside the reactive graph.
#[derive(Clone, Default)]
struct Ticker {
    ticks: Rc<Registry<u32>>,
}

impl PartialEq for Ticker {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ticks, &other.ticks)
    }
}

impl Observable for Ticker {
    type Value = u32;

    fn subscribe_observer(&self, observer: Rc<dyn Observer<u32>>) -> Subscription {
        self.ticks.subscribe(observer)
    }
}

#[test]
fn observe_accepts_any_observable() {
    let scope = Scope::detached();
    let ticker = Ticker::default();
    let other = Ticker::default();

    scope.observe(&ticker);
    scope.observe(&ticker.clone());
    scope.observe(&other);

    let observed = scope.observables();
    assert_eq!(observed.len(), 2);
    assert!(observed[0].is(&ticker));
    assert!(observed[1].is(&other));

    // the recorded handle still delivers
    let seen = Rc::new(Cell::new(0));
    let recorded = observed[0].downcast_ref::<Ticker>().cloned();
    let _sub = recorded.map(|recorded| {
        recorded.subscribe(Callbacks::new().on_next({
            let seen = Rc::clone(&seen);
            move |tick: &u32| seen.set(*tick)
        }))
    });
    ticker.ticks.notify_next(&7);
    assert_eq!(seen.get(), 7);
}

#[test]
fn disposal_is_observable() {
    let scope = Scope::detached();
    let completed = Rc::new(Cell::new(0));
    let _sub = scope.subscribe(Callbacks::new().on_complete({
        let completed = Rc::clone(&completed);
        move || completed.set(completed.get() + 1)
    }));

    scope.dispose();
    scope.dispose();
    assert_eq!(completed.get(), 1);
}

#[test]
fn dropping_a_detached_scope_disposes_it() {
    let log: Log = Rc::default();
    {
        let scope = Scope::detached();
        scope.run(|| {
            let child = Scope::new();
            on_dispose_log(&child, &log, "child");
        });
        on_dispose_log(&scope, &log, "scope");
    }
    assert_eq!(*log.borrow(), ["child", "scope"]);
}

#[test]
fn dispose_from_inside_a_cleanup() {
    let log: Log = Rc::default();
    let parent = Scope::detached();
    let child = Scope::with_parent(&parent);
    on_dispose_log(&child, &log, "child");

    // re-entrant disposal of the parent is a no-op
    child.on_dispose({
        let parent = parent.clone();
        move || parent.dispose()
    });
    on_dispose_log(&parent, &log, "parent");

    parent.dispose();
    assert_eq!(*log.borrow(), ["child", "parent"]);
}
