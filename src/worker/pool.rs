//! Fixed-size worker pool handing out one-shot result handles.
//!
//! Jobs go through a single shared channel, every worker thread pulls the next
//! job as soon as it is idle, so completion order is unrelated to submission
//! order. Each job reports back through its own capacity-1 channel which backs
//! the [`PendingResult`] returned by [`Pool::submit`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::errors::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Pool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    /// Spawns `threads` workers, at least one.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("osm-xml-worker-{i}"))
                .spawn(move || Self::worker_loop(&receiver))?;
            workers.push(handle);
        }
        debug!(threads = threads; "Started worker pool");

        Ok(Pool {
            sender: Some(sender),
            workers,
        })
    }

    pub fn default_size() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
        loop {
            // The lock is only held while waiting for the next job.
            let job = match receiver.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => break,
            };
            match job {
                Ok(job) => job(),
                Err(_) => break,
            }
        }
    }

    /// Queues `task` for execution on any worker.
    ///
    /// A panic inside `task` is caught and stored in the returned handle as a
    /// [`crate::errors::ErrorKind::WorkerFailed`] error.
    pub fn submit<T, F>(&self, task: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_sender, result_receiver) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| Error::worker_failed(panic_message(payload.as_ref())));
            // The receiver is gone when the session was aborted.
            let _ = result_sender.send(outcome);
        });

        let submitted = match &self.sender {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        };
        if !submitted {
            return PendingResult::ready(Err(Error::worker_failed("worker pool is shut down")));
        }
        PendingResult {
            state: State::Waiting(result_receiver),
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
        debug!("Worker pool stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

enum State<T> {
    Waiting(mpsc::Receiver<Result<T>>),
    Ready(Result<T>),
}

/// Handle to the eventual output of one submitted task.
///
/// Fulfilled exactly once by a worker and consumed exactly once by [`wait`],
/// which takes the handle by value.
///
/// [`wait`]: PendingResult::wait
pub struct PendingResult<T> {
    state: State<T>,
}

impl<T> PendingResult<T> {
    /// A handle that is already fulfilled, used for strings produced on the
    /// calling thread (header and footer).
    pub fn ready(result: Result<T>) -> Self {
        PendingResult {
            state: State::Ready(result),
        }
    }

    fn poll(&mut self) -> bool {
        let outcome = match &self.state {
            State::Ready(_) => return true,
            State::Waiting(receiver) => match receiver.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => Err(worker_vanished()),
            },
        };
        self.state = State::Ready(outcome);
        true
    }

    pub fn is_ready(&mut self) -> bool {
        self.poll()
    }

    /// Returns the stored failure if the task already finished with one.
    /// Never blocks.
    pub fn check_failure(&mut self) -> Result<()> {
        if self.poll() {
            if let State::Ready(Err(err)) = &self.state {
                return Err(err.clone());
            }
        }
        Ok(())
    }

    /// Blocks until the task has finished.
    pub fn wait(self) -> Result<T> {
        match self.state {
            State::Ready(outcome) => outcome,
            State::Waiting(receiver) => receiver.recv().unwrap_or_else(|_| Err(worker_vanished())),
        }
    }
}

fn worker_vanished() -> Error {
    Error::worker_failed("worker exited without producing a result")
}
