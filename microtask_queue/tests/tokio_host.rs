#![cfg(feature = "tokio")]

use microtask_queue::Microtasks;
use std::{cell::Cell, rc::Rc};

#[tokio::test]
async fn tasks_run_on_the_local_set() {
    Microtasks::init_tokio().expect("Failed to initialize tokio host");

    let local = tokio::task::LocalSet::new();
    let hits = Rc::new(Cell::new(0));

    local
        .run_until({
            let hits = Rc::clone(&hits);
            async move {
                Microtasks::queue({
                    let hits = Rc::clone(&hits);
                    move || hits.set(hits.get() + 1)
                });
                assert_eq!(hits.get(), 0);

                tokio::task::yield_now().await;
                assert_eq!(hits.get(), 1);
            }
        })
        .await;
}
