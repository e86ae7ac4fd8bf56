//! Mutation executor: background workers that run every write.
//!
//! Callers hand a closure to [`MutationExecutor::submit`], which queues it on
//! a channel shared by a small fixed pool of worker threads and then blocks on
//! a per-task reply channel. The closures themselves take the table's
//! exclusive lock, so however many workers exist, one mutation touches the
//! file at a time. Concurrency only exists in submission.
//!
//! Shutdown closes the queue, waits up to a grace period for the workers to
//! drain it, and past the deadline marks the executor cancelled: tasks still
//! queued are answered with [`StoreError::ShutDown`] without running, and
//! workers still busy are detached.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};

/// A queued unit of work. The flag says whether the executor was cancelled
/// by the time the task was dequeued.
type Task = Box<dyn FnOnce(bool) + Send + 'static>;

/// Poll interval while waiting for workers during shutdown
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Fixed pool of writer threads fed by a channel.
pub struct MutationExecutor {
    /// Queue entry point; `None` once shutdown has begun
    sender: Mutex<Option<Sender<Task>>>,
    /// Worker join handles
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    /// Set when the grace period expires with work still pending
    cancelled: Arc<AtomicBool>,
    /// Tasks queued or running
    pending: Arc<AtomicUsize>,
    /// How long shutdown waits for pending tasks
    grace: Duration,
}

impl MutationExecutor {
    /// Spawn `threads` workers.
    pub fn start(threads: usize, grace: Duration) -> StoreResult<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let cancelled = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let cancelled = Arc::clone(&cancelled);
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("pipestore-writer-{}", i))
                .spawn(move || worker_loop(receiver, cancelled, pending))
                .map_err(|e| StoreError::Io {
                    path: None,
                    kind: e.kind(),
                    message: format!("Failed to spawn writer thread: {}", e),
                })?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            cancelled,
            pending,
            grace,
        })
    }

    /// Queue `task` and block until a worker has run it.
    ///
    /// Errors returned by the task come back unchanged. `ShutDown` means the
    /// task was refused or cancelled; `Interrupted` means the worker dropped
    /// the reply without answering (the task panicked).
    pub fn submit<T, F>(&self, operation: &str, task: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> StoreResult<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel::<StoreResult<T>>(1);
        let job: Task = Box::new(move |cancelled| {
            let result = if cancelled { Err(StoreError::ShutDown) } else { task() };
            let _ = reply_tx.send(result);
        });

        {
            let sender = self.sender.lock();
            let sender = sender.as_ref().ok_or(StoreError::ShutDown)?;
            self.pending.fetch_add(1, Ordering::AcqRel);
            if sender.send(job).is_err() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                return Err(StoreError::ShutDown);
            }
        }

        reply_rx.recv().map_err(|_| StoreError::Interrupted { operation: operation.to_string() })?
    }

    /// Whether new tasks are still accepted.
    pub fn is_accepting(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Tasks queued or currently running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Stop accepting tasks and wait up to the grace period for the queue to
    /// drain. Returns true if every worker finished in time. Idempotent.
    pub fn shutdown(&self) -> bool {
        let sender = self.sender.lock().take();
        let was_running = sender.is_some();
        // Workers exit once the queue is empty and every sender is gone
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline && workers.iter().any(|h| !h.is_finished()) {
            thread::sleep(SHUTDOWN_POLL);
        }

        let drained = workers.iter().all(|h| h.is_finished());
        if !drained {
            self.cancelled.store(true, Ordering::Release);
            warn!(
                "Mutation queue did not drain within {:?}; cancelling {} pending task(s)",
                self.grace,
                self.pending()
            );
        }

        for handle in workers {
            // Unfinished workers are detached; they answer the remaining
            // queue with ShutDown and exit.
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        if was_running {
            info!("Mutation executor shut down (drained: {})", drained);
        }
        drained
    }
}

impl Drop for MutationExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Task>>>, cancelled: Arc<AtomicBool>, pending: Arc<AtomicUsize>) {
    loop {
        let task = {
            let receiver = receiver.lock();
            receiver.recv()
        };
        let Ok(task) = task else {
            return;
        };

        let cancel = cancelled.load(Ordering::Acquire);
        if panic::catch_unwind(AssertUnwindSafe(|| task(cancel))).is_err() {
            error!("Mutation task panicked on {}", thread::current().name().unwrap_or("writer"));
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(threads: usize) -> MutationExecutor {
        MutationExecutor::start(threads, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_submit_returns_value() {
        let exec = executor(2);
        let value = exec.submit("add", || Ok(40 + 2)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_submit_propagates_error() {
        let exec = executor(1);
        let err = exec
            .submit::<(), _>("lookup", || Err(StoreError::column_not_found("x")))
            .unwrap_err();
        assert!(matches!(err, StoreError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_panicking_task_interrupts_caller() {
        let exec = executor(1);
        let err = exec.submit::<(), _>("boom", || panic!("task failure")).unwrap_err();
        assert!(matches!(err, StoreError::Interrupted { ref operation } if operation == "boom"));

        // The worker survives the panic
        assert_eq!(exec.submit("after", || Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_submitters() {
        let exec = Arc::new(executor(4));
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let exec = Arc::clone(&exec);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let counter = Arc::clone(&counter);
                        exec.submit("inc", move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let exec = executor(2);
        assert!(exec.shutdown());
        assert!(!exec.is_accepting());
        assert!(matches!(exec.submit("late", || Ok(())), Err(StoreError::ShutDown)));

        // Second shutdown is a no-op
        assert!(exec.shutdown());
    }

    #[test]
    fn test_shutdown_waits_for_queued_tasks() {
        let exec = Arc::new(executor(1));
        let done = Arc::new(AtomicBool::new(false));

        let submitter = {
            let exec = Arc::clone(&exec);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                exec.submit("slow", move || {
                    thread::sleep(Duration::from_millis(100));
                    done.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(exec.shutdown());
        assert!(done.load(Ordering::SeqCst));
        assert!(submitter.join().unwrap().is_ok());
    }

    #[test]
    fn test_shutdown_grace_expiry_cancels_queue() {
        let exec = Arc::new(MutationExecutor::start(1, Duration::from_millis(50)).unwrap());

        let slow = {
            let exec = Arc::clone(&exec);
            thread::spawn(move || {
                exec.submit("slow", || {
                    thread::sleep(Duration::from_millis(400));
                    Ok(())
                })
            })
        };
        thread::sleep(Duration::from_millis(30));
        let queued = {
            let exec = Arc::clone(&exec);
            thread::spawn(move || exec.submit("queued", || Ok(())))
        };
        thread::sleep(Duration::from_millis(30));

        assert!(!exec.shutdown());
        assert!(slow.join().unwrap().is_ok());
        assert!(matches!(queued.join().unwrap(), Err(StoreError::ShutDown)));
    }
}
