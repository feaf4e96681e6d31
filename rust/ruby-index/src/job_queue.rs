use std::panic::{self, AssertUnwindSafe};
use std::{
    sync::Arc,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use crossbeam_utils::Backoff;

type BoxedJob = Box<dyn Job + Send + 'static>;

/// Work-stealing queue used to read and parse files in parallel.
///
/// Jobs go onto the global `injector` and workers move batches of them into their own local queues, stealing from
/// each other once the injector is drained. `in_flight` counts jobs that were queued but haven't finished, including
/// jobs pushed by other jobs (directory listing does this), so workers know when everything is done.
///
/// A job that panics doesn't take the run down with it: the panic is caught, counted in `panicked` and the worker
/// moves on to the next job.
#[derive(Default)]
pub struct JobQueue {
    injector: Injector<BoxedJob>,
    in_flight: AtomicUsize,
    panicked: AtomicUsize,
}

impl JobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            injector: Injector::new(),
            in_flight: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, job: BoxedJob) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.injector.push(job);
    }

    /// Number of jobs that panicked during the last runs
    #[must_use]
    pub fn panicked_count(&self) -> usize {
        self.panicked.load(Ordering::Acquire)
    }

    /// Run jobs until the queue is empty, on one worker per available CPU.
    ///
    /// Accepts the shared queue so jobs can enqueue more work while the runner is processing.
    pub fn run(queue: &Arc<JobQueue>) {
        let worker_count = thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);

        Self::run_with_workers(queue, worker_count);
    }

    fn run_with_workers(queue: &Arc<JobQueue>, worker_count: usize) {
        let mut handles = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        let mut stealers = Vec::with_capacity(worker_count);

        for _ in 0..worker_count {
            let worker = Worker::new_fifo();
            stealers.push(worker.stealer());
            workers.push(worker);
        }

        let stealers = Arc::new(stealers);

        for worker in workers {
            let queue = Arc::clone(queue);
            let stealers = Arc::clone(&stealers);
            handles.push(thread::spawn(move || queue.worker_loop(&worker, &stealers)));
        }

        for handle in handles {
            // Job panics are caught inside the loop, so a worker can only fail on its own bookkeeping
            if handle.join().is_err() {
                tracing::error!("indexing worker thread terminated unexpectedly");
            }
        }
    }

    /// Drain work for a single worker. Exits once nothing is left anywhere and `in_flight` reaches zero
    fn worker_loop(&self, local: &Worker<BoxedJob>, stealers: &Arc<Vec<Stealer<BoxedJob>>>) {
        let backoff = Backoff::new();

        loop {
            let Some(job) = Self::steal_job(local, stealers, &self.injector) else {
                if self.in_flight.load(Ordering::Acquire) == 0 {
                    break;
                }

                backoff.snooze();
                continue;
            };

            backoff.reset();

            let result = panic::catch_unwind(AssertUnwindSafe(|| job.run()));

            if let Err(payload) = result {
                self.panicked.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(panic = panic_message(payload.as_ref()), "job panicked");
            }

            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Next job for a worker: its own queue first, then a batch from the injector, then its peers
    fn steal_job(
        local: &Worker<BoxedJob>,
        stealers: &[Stealer<BoxedJob>],
        injector: &Injector<BoxedJob>,
    ) -> Option<BoxedJob> {
        if let Some(job) = local.pop() {
            return Some(job);
        }

        match injector.steal_batch_and_pop(local) {
            Steal::Success(job) => return Some(job),
            Steal::Retry => return None,
            Steal::Empty => {}
        }

        for stealer in stealers {
            match stealer.steal_batch_and_pop(local) {
                Steal::Success(job) => return Some(job),
                Steal::Retry => return None,
                Steal::Empty => {}
            }
        }

        None
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Unit of work scheduled on a `JobQueue`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ruby_index::job_queue::{Job, JobQueue};
///
/// struct PrintJob;
///
/// impl Job for PrintJob {
///     fn run(&self) {
///         println!("hello from a worker");
///     }
/// }
///
/// let queue = Arc::new(JobQueue::new());
/// queue.push(Box::new(PrintJob));
/// JobQueue::run(&queue);
/// ```
pub trait Job: Send {
    fn run(&self);
}
