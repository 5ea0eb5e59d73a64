use reactive_cells::{
    graph::Callbacks, prelude::*, signal::Ref, ReactiveError,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

#[test]
fn create_ref() {
    let a = Ref::new(0);
    assert_eq!(a.get(), 0);
    assert_eq!(a.get_untracked(), 0);
    assert_eq!(a.with(|n| n + 1), 1);
    assert_eq!(a.with_untracked(|n| n + 1), 1);
}

#[test]
fn update_ref() {
    let a = Ref::new(0);
    a.update(|n| *n += 1);
    assert_eq!(a.get(), 1);
    assert_eq!(a.version(), 1);
}

#[test]
fn equal_values_do_not_notify() {
    let a = Ref::new(String::from("same"));
    let notified = Rc::new(Cell::new(0));
    let _sub = a.subscribe(Callbacks::new().on_next({
        let notified = Rc::clone(&notified);
        move |_: &String| notified.set(notified.get() + 1)
    }));

    a.set(String::from("same"));
    assert_eq!(a.version(), 0);
    assert_eq!(notified.get(), 0);

    a.set(String::from("different"));
    assert_eq!(a.version(), 1);
    assert_eq!(notified.get(), 1);
}

#[test]
fn custom_compare() {
    // only the first character counts
    let a = Ref::new_with_compare(String::from("apple"), |a: &String, b: &String| {
        a.chars().next() == b.chars().next()
    });
    a.set(String::from("avocado"));
    assert_eq!(a.version(), 0);
    assert_eq!(a.get(), "apple");

    a.set(String::from("banana"));
    assert_eq!(a.version(), 1);
    assert_eq!(a.get(), "banana");
}

#[test]
fn nan_needs_a_bitwise_compare() {
    let plain = Ref::new(f64::NAN);
    plain.set(f64::NAN);
    assert_eq!(plain.version(), 1);

    let bitwise = Ref::new_with_compare(f64::NAN, |a: &f64, b: &f64| {
        a.to_bits() == b.to_bits()
    });
    let notified = Rc::new(Cell::new(0));
    let _sub = bitwise.subscribe(Callbacks::new().on_next({
        let notified = Rc::clone(&notified);
        move |_: &f64| notified.set(notified.get() + 1)
    }));
    bitwise.set(f64::NAN);
    assert_eq!(bitwise.version(), 0);
    assert_eq!(notified.get(), 0);

    bitwise.set(1.5);
    assert_eq!(bitwise.version(), 1);
    assert_eq!(notified.get(), 1);
}

#[test]
fn set_notifies_synchronously() {
    let a = Ref::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _sub = a.subscribe(Callbacks::new().on_next({
        let seen = Rc::clone(&seen);
        move |value: &i32| seen.borrow_mut().push(*value)
    }));

    a.set(1);
    a.set(2);
    assert_eq!(*seen.borrow(), [1, 2]);
}

#[test]
fn observer_can_read_the_ref_it_observes() {
    let a = Ref::new(0);
    let seen = Rc::new(Cell::new(0));
    let _sub = a.subscribe(Callbacks::new().on_next({
        let a = a.clone();
        let seen = Rc::clone(&seen);
        move |_: &i32| seen.set(a.get_untracked())
    }));

    a.set(5);
    assert_eq!(seen.get(), 5);
}

#[test]
fn dispose_completes_once_and_silences() {
    let a = Ref::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));
    let _sub = a.subscribe(
        Callbacks::new()
            .on_next({
                let log = Rc::clone(&log);
                move |value: &i32| log.borrow_mut().push(format!("next {value}"))
            })
            .on_complete({
                let log = Rc::clone(&log);
                move || log.borrow_mut().push(String::from("complete"))
            }),
    );

    a.dispose();
    a.dispose();
    assert!(a.is_disposed());

    // still readable, still settable, but nobody hears about it
    a.set(3);
    assert_eq!(a.get(), 3);
    assert_eq!(*log.borrow(), ["complete"]);

    // late subscribers complete right away
    let late = Rc::new(Cell::new(false));
    let sub = a.subscribe(Callbacks::new().on_complete({
        let late = Rc::clone(&late);
        move || late.set(true)
    }));
    assert!(late.get());
    assert!(sub.is_closed());
}

#[test]
fn forwarding_mirrors_until_set() {
    let source = Ref::new(1);
    let mirror = Ref::forwarding(&source);
    assert!(mirror.is_forwarding());
    assert_eq!(mirror.get(), 1);

    source.set(2);
    assert_eq!(mirror.get(), 2);

    mirror.set(10);
    assert!(!mirror.is_forwarding());

    source.set(3);
    assert_eq!(mirror.get(), 10);
    assert_eq!(source.get(), 3);
}

#[test]
fn forward_from_switches_source() {
    let first = Ref::new("first");
    let second = Ref::new("second");
    let mirror = Ref::new("own");

    mirror.forward_from(&first);
    assert_eq!(mirror.get(), "first");

    mirror.forward_from(&second);
    first.set("first again");
    assert_eq!(mirror.get(), "second");

    second.set("second again");
    assert_eq!(mirror.get(), "second again");
}

#[test]
fn unsubscribe_stops_notifications() {
    let a = Ref::new(0);
    let count = Rc::new(Cell::new(0));
    let sub = a.subscribe(Callbacks::new().on_next({
        let count = Rc::clone(&count);
        move |_: &i32| count.set(count.get() + 1)
    }));

    a.set(1);
    sub.disable();
    a.set(2);
    sub.enable();
    a.set(3);
    sub.unsubscribe();
    a.set(4);

    assert_eq!(count.get(), 2);
    assert!(sub.is_closed());
}

#[test]
fn set_never_fails() {
    let a = Ref::new(0);
    assert!(matches!(a.try_set(1), Ok(())));
    a.dispose();
    assert!(matches!(a.try_set(2), Ok(())));
    assert!(!matches!(a.try_get(), Err(ReactiveError::Disposed)));
}
