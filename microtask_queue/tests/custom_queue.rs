use microtask_queue::{CustomQueue, Microtasks, QueueError, Task};
use std::{
    cell::RefCell,
    sync::atomic::{AtomicUsize, Ordering},
};

static QUEUED: AtomicUsize = AtomicUsize::new(0);
static FLUSHED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static PARKED: RefCell<Vec<Task>> = const { RefCell::new(Vec::new()) };
}

struct ParkingQueue;

impl CustomQueue for ParkingQueue {
    fn queue(&self, task: Task) {
        QUEUED.fetch_add(1, Ordering::SeqCst);
        PARKED.with_borrow_mut(|parked| parked.push(task));
    }

    fn flush(&self) {
        FLUSHED.fetch_add(1, Ordering::SeqCst);
        let tasks = PARKED.with_borrow_mut(std::mem::take);
        for task in tasks {
            task();
        }
    }
}

#[test]
fn custom_queue_takes_over_scheduling() {
    Microtasks::init_custom_queue(ParkingQueue)
        .expect("first initialization should succeed");

    let hits = std::rc::Rc::new(std::cell::Cell::new(0));
    Microtasks::queue({
        let hits = hits.clone();
        move || hits.set(hits.get() + 1)
    });

    assert_eq!(QUEUED.load(Ordering::SeqCst), 1);
    // the thread-local queue is bypassed entirely
    assert_eq!(Microtasks::pending(), 0);
    assert_eq!(hits.get(), 0);

    assert_eq!(Microtasks::flush(), 0);
    assert_eq!(FLUSHED.load(Ordering::SeqCst), 1);
    assert_eq!(hits.get(), 1);

    let second = Microtasks::init_custom_queue(ParkingQueue);
    assert!(matches!(second, Err(QueueError::AlreadySet)));
}
