//! A bounded pool of worker threads for fire-and-forget engine calls.
//!
//! Callers that must not block on the store submit closures here and learn
//! about results through the [`EventBus`](crate::EventBus). The job queue is
//! bounded: [`WorkerPool::submit`] fails fast instead of queueing without
//! limit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Progress {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl Progress {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Fixed-size thread pool with a bounded job queue.
///
/// Dropping the pool shuts it down and waits for queued jobs to finish.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use loaner::WorkerPool;
///
/// let pool = WorkerPool::new(2, 8).unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..4 {
///     let done = Arc::clone(&done);
///     pool.submit(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// assert!(pool.wait_idle(Duration::from_secs(5)));
/// assert_eq!(done.load(Ordering::SeqCst), 4);
/// ```
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    progress: Arc<Progress>,
    threads: usize,
    capacity: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Starts `threads` workers sharing a queue of `capacity` jobs.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either argument is zero, or an I/O
    /// error if a thread cannot be spawned.
    pub fn new(threads: usize, capacity: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::validation("workers.threads", "must be greater than 0"));
        }
        if capacity == 0 {
            return Err(Error::validation(
                "workers.queue_capacity",
                "must be greater than 0",
            ));
        }

        let (sender, receiver) = mpsc::sync_channel::<Job>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let progress = Arc::new(Progress::default());

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = Arc::clone(&receiver);
            let progress = Arc::clone(&progress);
            let handle = thread::Builder::new()
                .name(format!("loaner-worker-{index}"))
                .spawn(move || work(&receiver, &progress))?;
            workers.push(handle);
        }
        log::debug!("started {threads} workers (queue capacity {capacity})");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            progress,
            threads,
            capacity,
        })
    }

    /// Queues `job` for execution on some worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPoolSaturated`] if the queue is full and
    /// [`Error::WorkerPoolClosed`] after [`WorkerPool::shutdown`].
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(Error::WorkerPoolClosed);
        };

        *self.progress.pending.lock() += 1;
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.progress.finish_one();
                match e {
                    TrySendError::Full(_) => {
                        log::warn!("worker pool saturated ({} queued)", self.capacity);
                        Err(Error::WorkerPoolSaturated)
                    }
                    TrySendError::Disconnected(_) => Err(Error::WorkerPoolClosed),
                }
            }
        }
    }

    /// Returns the number of jobs queued or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.progress.pending.lock()
    }

    /// Returns the number of worker threads.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Blocks until no job is pending or `timeout` elapses.
    ///
    /// Returns `true` if the pool went idle in time.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.progress.pending.lock();
        while *pending > 0 {
            if self
                .progress
                .idle
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                return *pending == 0;
            }
        }
        true
    }

    /// Stops accepting jobs, lets the workers drain the queue and joins them.
    ///
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        // Dropping the sender ends each worker's loop once the queue is empty
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                log::error!("{name} exited abnormally");
            }
        }
        log::debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(receiver: &Mutex<Receiver<Job>>, progress: &Progress) {
    loop {
        // Only one worker waits on the channel at a time
        let job = receiver.lock().recv();
        let Ok(job) = job else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!(
                "job panicked on {}",
                thread::current().name().unwrap_or("worker")
            );
        }
        progress.finish_one();
    }
}
