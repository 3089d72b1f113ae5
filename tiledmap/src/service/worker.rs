//! Dedicated worker threads draining FIFO task queues.
//!
//! Each [`WorkerQueue`] owns one named OS thread that pops closures from an
//! unbounded channel and runs them in submission order. Pushing a task
//! returns a receiver that resolves to the task's boolean result. A task
//! that never ran (queue stopped, task panicked) resolves to an error,
//! which callers treat as `false`.

use std::cell::Cell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Returns true on a thread owned by a [`WorkerQueue`].
pub fn is_worker_thread() -> bool {
    ON_WORKER.with(Cell::get)
}

/// A FIFO task queue served by a single worker thread.
pub struct WorkerQueue {
    name: &'static str,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerQueue {
    /// Starts the worker thread.
    ///
    /// # Arguments
    ///
    /// * `name` - Thread name, also used in log output
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(name: &'static str) -> io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                ON_WORKER.with(|flag| flag.set(true));
                debug!(worker = name, "Worker started");
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(worker = name, "Worker task panicked");
                    }
                }
                debug!(worker = name, "Worker stopped");
            })?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queues `task` and returns a receiver for its result.
    ///
    /// After [`stop`](Self::stop) the task is dropped unrun and the receiver
    /// resolves to an error.
    pub fn push<F>(&self, task: F) -> oneshot::Receiver<bool>
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The receiver may be gone for fire-and-forget dispatch
            let _ = tx.send(task());
        });

        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!(worker = self.name, "Worker is gone, task dropped");
                }
            }
            None => warn!(worker = self.name, "Queue stopped, task dropped"),
        }
        rx
    }

    /// Returns true until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Closes the queue and waits for the worker to finish queued tasks.
    pub fn stop(&self) {
        self.sender.lock().take();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(worker = self.name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerQueue")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_push_returns_result() {
        let queue = WorkerQueue::spawn("TestWorker").unwrap();
        let yes = queue.push(|| true);
        let no = queue.push(|| false);

        assert_eq!(futures::executor::block_on(yes), Ok(true));
        assert_eq!(futures::executor::block_on(no), Ok(false));
    }

    #[test]
    fn test_worker_thread_is_detected() {
        let queue = WorkerQueue::spawn("DetectWorker").unwrap();
        let on_worker = queue.push(is_worker_thread);

        assert_eq!(futures::executor::block_on(on_worker), Ok(true));
        assert!(!is_worker_thread());
    }

    #[test]
    fn test_tasks_run_in_order_on_named_thread() {
        let queue = WorkerQueue::spawn("OrderWorker").unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let receivers: Vec<_> = (0..20)
            .map(|i| {
                let seen = seen.clone();
                queue.push(move || {
                    assert_eq!(thread::current().name(), Some("OrderWorker"));
                    seen.lock().push(i);
                    true
                })
            })
            .collect();

        for rx in receivers {
            assert_eq!(futures::executor::block_on(rx), Ok(true));
        }
        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_after_stop_resolves_to_error() {
        let queue = WorkerQueue::spawn("StoppedWorker").unwrap();
        queue.stop();
        assert!(!queue.is_running());

        let rx = queue.push(|| true);
        assert!(futures::executor::block_on(rx).is_err());
    }

    #[test]
    fn test_stop_drains_queued_tasks() {
        let queue = WorkerQueue::spawn("DrainWorker").unwrap();
        let rx = queue.push(|| {
            thread::sleep(std::time::Duration::from_millis(20));
            true
        });
        queue.stop();
        assert_eq!(futures::executor::block_on(rx), Ok(true));
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let queue = WorkerQueue::spawn("PanicWorker").unwrap();
        let failed = queue.push(|| panic!("boom"));
        let ok = queue.push(|| true);

        assert!(futures::executor::block_on(failed).is_err());
        assert_eq!(futures::executor::block_on(ok), Ok(true));
    }
}
