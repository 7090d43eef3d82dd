//! Deferred Flush Queue
//!
//! The one asynchronous primitive in the engine: a microtask-equivalent
//! deferred callback queue used by state managers to batch notifications.
//!
//! Rust has no ambient microtask queue, so deferral is modeled as a
//! thread-local FIFO with an explicit [`flush`]. The host runtime drives
//! `flush()` at the end of each turn of its event loop; tests call it
//! directly to observe the post-batch state.
//!
//! Guarantees:
//!
//! - A deferred callback always fires on the next flush (no cancellation).
//! - Callbacks run in FIFO order; callbacks enqueued while flushing run in
//!   the same flush, after everything already queued.
//! - Re-entrant `flush()` calls are no-ops; the outer drain loop picks up
//!   anything the inner call would have run.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tracing::trace;

thread_local! {
    static QUEUE: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
    static FLUSHING: Cell<bool> = Cell::new(false);
}

/// Enqueue a callback for the next flush.
pub fn defer<F>(callback: F)
where
    F: FnOnce() + 'static,
{
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(callback)));
}

/// Run every deferred callback, in FIFO order, until the queue is empty.
///
/// A no-op when called from within a callback that is itself being flushed.
pub fn flush() {
    let already_flushing = FLUSHING.with(|flag| flag.replace(true));
    if already_flushing {
        return;
    }

    let mut drained = 0_usize;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        match next {
            Some(callback) => {
                callback();
                drained += 1;
            }
            None => break,
        }
    }

    if drained > 0 {
        trace!(drained, "deferred queue flushed");
    }
    FLUSHING.with(|flag| flag.set(false));
}

/// Number of callbacks currently waiting for a flush.
pub fn pending() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn flush_runs_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in [1, 2, 3] {
            let order = order.clone();
            defer(move || order.borrow_mut().push(tag));
        }

        assert_eq!(pending(), 3);
        flush();
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
        assert_eq!(pending(), 0);
    }

    #[test]
    fn callbacks_enqueued_while_flushing_run_in_same_flush() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_outer = order.clone();
        defer(move || {
            order_outer.borrow_mut().push("outer");
            let order_inner = order_outer.clone();
            defer(move || order_inner.borrow_mut().push("inner"));
        });

        flush();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn reentrant_flush_is_noop() {
        let ran = Rc::new(Cell::new(0));

        let ran_outer = ran.clone();
        defer(move || {
            // The inner flush must not steal the rest of the queue.
            flush();
            ran_outer.set(ran_outer.get() + 1);
        });
        let ran_second = ran.clone();
        defer(move || ran_second.set(ran_second.get() + 1));

        flush();
        assert_eq!(ran.get(), 2);
    }
}
