//! FIFO of pending results drained strictly in push order.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::errors::{Error, Result};

use super::pool::PendingResult;

struct Inner<T> {
    pending: VecDeque<PendingResult<T>>,
    closed: bool,
}

/// Unbounded queue of [`PendingResult`] handles.
///
/// Any number of producers may push, but only one consumer may call
/// [`pop_next_ready_or_wait`](OrderedQueue::pop_next_ready_or_wait) at a time.
pub struct OrderedQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        OrderedQueue {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }
}

impl<T> OrderedQueue<T> {
    pub fn new() -> Self {
        OrderedQueue::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a handle. Never waits for any result.
    pub fn push(&self, handle: PendingResult<T>) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::misuse("push on a closed output queue"));
        }
        inner.pending.push_back(handle);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// No more pushes are accepted. Handles already queued can still be popped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Removes the oldest handle and waits for its result, even when later
    /// handles are already fulfilled.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub fn pop_next_ready_or_wait(&self) -> Option<Result<T>> {
        let head = {
            let inner = self.lock();
            let mut inner = self
                .available
                .wait_while(inner, |inner| inner.pending.is_empty() && !inner.closed)
                .unwrap_or_else(PoisonError::into_inner);
            inner.pending.pop_front()?
        };
        // Producers can keep pushing while we block on the head.
        Some(head.wait())
    }

    /// Surfaces a failure stored in the head handle without blocking.
    ///
    /// Only the head is inspected. A failure further back, queued behind a
    /// block that is still running, shows up once the drain reaches it.
    pub fn check_head_failure(&self) -> Result<()> {
        match self.lock().pending.front_mut() {
            Some(head) => head.check_failure(),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}
