//! A deferred-execution queue for code that needs to run "soon, but not now."
//!
//! A task queued with [`Microtasks::queue`] runs once, after the synchronous work that queued it
//! has unwound, and before any work queued later. Reactive runtimes use this to batch
//! recomputation: a burst of writes can mark many nodes stale while the actual work happens once,
//! when the queue is drained.
//!
//! By default every thread has its own FIFO queue, drained explicitly with [`Microtasks::flush`].
//! A program that already runs an event loop can instead install a host once, globally, with
//! [`Microtasks::init_custom_queue`] (or [`Microtasks::init_tokio`] with the `tokio` feature).
//!
//! ```rust
//! use microtask_queue::Microtasks;
//! use std::{cell::Cell, rc::Rc};
//!
//! let ran = Rc::new(Cell::new(false));
//! Microtasks::queue({
//!     let ran = Rc::clone(&ran);
//!     move || ran.set(true)
//! });
//!
//! // nothing happens until the queue is drained
//! assert!(!ran.get());
//! assert_eq!(Microtasks::flush(), 1);
//! assert!(ran.get());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    sync::OnceLock,
};
use thiserror::Error;

/// A callback waiting to be run.
pub type Task = Box<dyn FnOnce() + 'static>;

static HOST: OnceLock<Box<dyn CustomQueue + Send + Sync>> = OnceLock::new();

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Errors that can occur when configuring the queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A host has already been installed.
    #[error("A microtask host has already been set.")]
    AlreadySet,
}

/// A host event loop that takes over scheduling of queued tasks.
///
/// The host must run each task exactly once, after the current synchronous turn, in the order
/// the tasks were queued.
pub trait CustomQueue {
    /// Schedules a task.
    fn queue(&self, task: Task);

    /// Asks the host to run whatever it has pending, if it can do so synchronously.
    fn flush(&self) {}
}

/// The deferred-execution queue.
pub struct Microtasks;

impl Microtasks {
    /// Queues a task to run after the current synchronous work.
    pub fn queue(task: impl FnOnce() + 'static) {
        if let Some(host) = HOST.get() {
            host.queue(Box::new(task));
        } else {
            QUEUE.with_borrow_mut(|queue| queue.push_back(Box::new(task)));
        }
    }

    /// Drains the current thread's queue, returning how many tasks ran.
    ///
    /// Tasks queued by other tasks during the flush run in the same flush. Calling `flush` from
    /// inside a task does nothing: the outer flush is already draining.
    ///
    /// If a host has been installed, this forwards to [`CustomQueue::flush`] and returns `0`.
    pub fn flush() -> usize {
        if let Some(host) = HOST.get() {
            host.flush();
            return 0;
        }

        if FLUSHING.replace(true) {
            return 0;
        }
        let _guard = FlushGuard;

        let mut ran = 0;
        while let Some(task) = QUEUE.with_borrow_mut(VecDeque::pop_front) {
            task();
            ran += 1;
        }
        ran
    }

    /// The number of tasks waiting in the current thread's queue.
    pub fn pending() -> usize {
        QUEUE.with_borrow(VecDeque::len)
    }

    /// Globally installs a custom host for all queued tasks.
    ///
    /// Returns `Err(_)` if a host has already been set.
    pub fn init_custom_queue(
        queue: impl CustomQueue + Send + Sync + 'static,
    ) -> Result<(), QueueError> {
        HOST.set(Box::new(queue))
            .map_err(|_| QueueError::AlreadySet)?;
        Ok(())
    }

    /// Globally sets [`tokio`]'s local task set as the host: each task becomes a
    /// [`tokio::task::spawn_local`] task, so it must be queued from inside a `LocalSet`.
    ///
    /// Returns `Err(_)` if a host has already been set.
    ///
    /// Requires the `tokio` feature to be activated on this crate.
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    pub fn init_tokio() -> Result<(), QueueError> {
        struct TokioLocal;

        impl CustomQueue for TokioLocal {
            fn queue(&self, task: Task) {
                tokio::task::spawn_local(async move { task() });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("installing tokio as the microtask host");

        Self::init_custom_queue(TokioLocal)
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.set(false);
    }
}
