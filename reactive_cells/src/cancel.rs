//! Cancellation tokens that dispose reactive nodes from the outside.

use std::{cell::RefCell, fmt::Debug, rc::Rc};

/// A one-shot cancellation signal.
///
/// Implementors fire each registered callback at most once. A callback registered after the
/// token has already fired runs immediately.
pub trait CancellationToken {
    /// Whether the token has already fired.
    fn is_cancelled(&self) -> bool;

    /// Registers a callback to run when the token fires.
    fn on_cancel(&self, callback: Box<dyn FnOnce()>);
}

/// A cloneable, single-threaded [`CancellationToken`].
///
/// ```rust
/// use reactive_cells::{cancel::CancelToken, prelude::*, signal::Ref};
///
/// let token = CancelToken::new();
/// let count = Ref::new_with_token(0, &token);
///
/// token.cancel();
/// assert!(count.is_disposed());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Rc<RefCell<CancelInner>>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: bool,
    callbacks: Vec<Box<dyn FnOnce()>>,
}

impl Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    /// Creates a token that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled {
                return;
            }
            inner.cancelled = true;
            std::mem::take(&mut inner.callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl CancellationToken for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }

    fn on_cancel(&self, callback: Box<dyn FnOnce()>) {
        let mut inner = self.inner.borrow_mut();
        if inner.cancelled {
            drop(inner);
            callback();
        } else {
            inner.callbacks.push(callback);
        }
    }
}
