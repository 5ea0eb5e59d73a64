use microtask_queue::Microtasks;
use std::{cell::RefCell, rc::Rc};

fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str)) {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let push = {
        let log = Rc::clone(&log);
        move |entry: &'static str| log.borrow_mut().push(entry)
    };
    (log, push)
}

#[test]
fn tasks_wait_for_flush() {
    let (log, push) = recorder();
    let push = Rc::new(push);

    Microtasks::queue({
        let push = Rc::clone(&push);
        move || push("a")
    });
    Microtasks::queue({
        let push = Rc::clone(&push);
        move || push("b")
    });

    assert!(log.borrow().is_empty());
    assert_eq!(Microtasks::pending(), 2);

    assert_eq!(Microtasks::flush(), 2);
    assert_eq!(*log.borrow(), ["a", "b"]);
    assert_eq!(Microtasks::pending(), 0);
}

#[test]
fn tasks_queued_while_flushing_run_in_the_same_flush() {
    let (log, push) = recorder();
    let push = Rc::new(push);

    Microtasks::queue({
        let push = Rc::clone(&push);
        move || {
            push("outer");
            Microtasks::queue({
                let push = Rc::clone(&push);
                move || push("inner")
            });
        }
    });
    Microtasks::queue({
        let push = Rc::clone(&push);
        move || push("second")
    });

    assert_eq!(Microtasks::flush(), 3);
    // FIFO: the nested task lands behind everything already waiting
    assert_eq!(*log.borrow(), ["outer", "second", "inner"]);
}

#[test]
fn nested_flush_is_a_no_op() {
    let nested = Rc::new(RefCell::new(None));

    Microtasks::queue({
        let nested = Rc::clone(&nested);
        move || *nested.borrow_mut() = Some(Microtasks::flush())
    });
    Microtasks::queue(|| {});

    assert_eq!(Microtasks::flush(), 2);
    assert_eq!(*nested.borrow(), Some(0));
}

#[test]
fn queues_are_per_thread() {
    Microtasks::queue(|| {});
    let other = std::thread::spawn(Microtasks::pending)
        .join()
        .expect("thread should not panic");
    assert_eq!(other, 0);
    assert_eq!(Microtasks::pending(), 1);
    Microtasks::flush();
}
