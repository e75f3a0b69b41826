//! Background executor and timers
//!
//! Storage writes, their continuations and debounced refreshes all run
//! here, off the caller's thread.
//!
//! ```text
//!  execute(task) ──────────────────────────┐
//!                                           ▼
//!  schedule(delay, task) ─► timer thread ─► task queue ─► worker threads
//!  cancel(key) ───────────► (SlotMap)       (crossbeam)
//! ```
//!
//! The timer thread sleeps until the earliest deadline or until woken by a
//! new timer. Dropping the [`Scheduler`] disconnects both channels; queued
//! tasks are still drained, pending timers are discarded.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ctxperms_core::scheduler::{Scheduler, SchedulerGateway};
//!
//! let scheduler = Scheduler::new(2)?;
//! scheduler.execute(Box::new(|| tracing::info!("now")));
//! let key = scheduler.schedule(Duration::from_secs(1), Box::new(|| tracing::info!("later")));
//! scheduler.cancel(key);
//! ```

mod timer;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

pub use timer::TimerKey;
use timer::{Timer, TimerRegistry};

/// A unit of background work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capacity of the task queue
const QUEUE_CAPACITY: usize = 1024;

/// Executor and timer primitives the engine depends on
pub trait SchedulerGateway: Send + Sync {
    /// Run a task on a background thread as soon as possible
    fn execute(&self, task: Task);

    /// Run a task once after `delay`
    fn schedule(&self, delay: Duration, task: Task) -> TimerKey;

    /// Cancel a pending timer
    ///
    /// Returns `true` if the timer was still pending and will not run.
    fn cancel(&self, key: TimerKey) -> bool;
}

/// Thread-backed [`SchedulerGateway`]
pub struct Scheduler {
    tasks: Sender<Task>,
    timers: Arc<Mutex<TimerRegistry>>,
    wake: Sender<()>,
    receiver: Receiver<Task>,
}

impl Scheduler {
    /// Spawn `workers` executor threads plus one timer thread
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let (tasks, receiver) = bounded::<Task>(QUEUE_CAPACITY);
        let (wake, wake_rx) = unbounded::<()>();
        let timers = Arc::new(Mutex::new(TimerRegistry::default()));

        for i in 0..workers.max(1) {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("ctxperms-worker-{}", i))
                .spawn(move || run_worker(receiver))?;
        }

        {
            let timers = timers.clone();
            let tasks = tasks.clone();
            thread::Builder::new()
                .name("ctxperms-timer".to_string())
                .spawn(move || run_timers(timers, tasks, wake_rx))?;
        }

        tracing::debug!("Scheduler started with {} workers", workers.max(1));
        Ok(Self {
            tasks,
            timers,
            wake,
            receiver,
        })
    }

    /// Number of tasks waiting for a worker
    pub fn queued_task_count(&self) -> usize {
        self.receiver.len()
    }

    /// Number of timers waiting for their deadline
    pub fn pending_timer_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl SchedulerGateway for Scheduler {
    #[tracing::instrument(skip(self, task))]
    fn execute(&self, task: Task) {
        // Blocks only while the queue is full; workers drain it
        if let Err(e) = self.tasks.send(task) {
            tracing::error!("Failed to queue task: {}", e);
        }
    }

    #[tracing::instrument(skip(self, task))]
    fn schedule(&self, delay: Duration, task: Task) -> TimerKey {
        let key = self.timers.lock().insert(Timer::new(delay, task));
        if self.wake.send(()).is_err() {
            tracing::error!("Timer thread disconnected");
        }
        key
    }

    fn cancel(&self, key: TimerKey) -> bool {
        self.timers.lock().remove(key)
    }
}

fn run_worker(receiver: Receiver<Task>) {
    while let Ok(task) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("Background task panicked");
        }
    }
}

fn run_timers(timers: Arc<Mutex<TimerRegistry>>, tasks: Sender<Task>, wake: Receiver<()>) {
    loop {
        let now = Instant::now();
        let (due, wait) = {
            let mut registry = timers.lock();
            let due = registry.take_due(now);
            (due, registry.next_wait(now))
        };

        for task in due {
            if tasks.send(task).is_err() {
                tracing::error!("Task queue disconnected");
                return;
            }
        }

        let woken = match wait {
            Some(wait) => wake.recv_timeout(wait),
            None => wake.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        if let Err(RecvTimeoutError::Disconnected) = woken {
            tracing::debug!("Scheduler dropped, timer thread exiting");
            return;
        }
    }
}
