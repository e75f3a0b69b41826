//! Debounced update buffer
//!
//! Collapses bursts of "please recompute" requests into one execution.
//! Each request cancels the pending timer and schedules a fresh one, so
//! only the latest request's deadline counts:
//!
//! ```text
//! request ─┐ request ─┐ request ─┐
//!          ▼          ▼          ▼
//!     [--window--]
//!                [--window--]
//!                           [--window--] ─► task runs once
//! ```
//!
//! A superseded request never runs. Cancellation can lose a race with a
//! timer that has already been handed to the executor, so every scheduled
//! run carries a generation number and bails out unless it is still the
//! latest one.
//!
//! The scheduler is never called with the `pending` lock held, so a
//! gateway may run due tasks inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::scheduler::{SchedulerGateway, TimerKey};

type BufferedTask = Box<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct Pending {
    key: Option<TimerKey>,
    generation: u64,
    last_run: u64,
}

struct Inner {
    scheduler: Arc<dyn SchedulerGateway>,
    window: Duration,
    task: BufferedTask,
    pending: Mutex<Pending>,
    executions: AtomicU64,
}

impl Inner {
    /// Start a new generation, handing back the timer it supersedes
    fn advance(&self) -> (u64, Option<TimerKey>) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        (pending.generation, pending.key.take())
    }

    fn run(&self, generation: u64) {
        {
            let mut pending = self.pending.lock();
            if pending.generation != generation {
                tracing::debug!("Dropping superseded update (generation {})", generation);
                return;
            }
            pending.key = None;
            pending.last_run = generation;
        }
        self.executions.fetch_add(1, Ordering::AcqRel);
        (self.task)();
    }
}

/// Coalescing scheduler for one recompute task
#[derive(Clone)]
pub struct UpdateBuffer {
    inner: Arc<Inner>,
}

impl UpdateBuffer {
    /// Create a buffer that runs `task` at most once per quiet `window`
    pub fn new<F>(scheduler: Arc<dyn SchedulerGateway>, window: Duration, task: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                window,
                task: Box::new(task),
                pending: Mutex::new(Pending::default()),
                executions: AtomicU64::new(0),
            }),
        }
    }

    /// Request an execution, superseding any pending one
    pub fn request(&self) {
        let (generation, previous) = self.inner.advance();

        if let Some(key) = previous {
            if self.inner.scheduler.cancel(key) {
                tracing::debug!("Superseded pending update");
            }
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = self.inner.scheduler.schedule(
            self.inner.window,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.run(generation);
                }
            }),
        );

        let mut pending = self.inner.pending.lock();
        if pending.generation == generation {
            // Already ran if the gateway fired it inline
            if pending.last_run != generation {
                pending.key = Some(key);
            }
        } else {
            drop(pending);
            self.inner.scheduler.cancel(key);
        }
    }

    /// Run the task now on the calling thread, discarding any pending request
    pub fn flush(&self) {
        let (generation, previous) = self.inner.advance();
        if let Some(key) = previous {
            self.inner.scheduler.cancel(key);
        }
        self.inner.run(generation);
    }

    /// Check if a request is waiting for its window to elapse
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().key.is_some()
    }

    /// Number of times the task has been started
    pub fn executions(&self) -> u64 {
        self.inner.executions.load(Ordering::Acquire)
    }

    /// Debounce window
    pub fn window(&self) -> Duration {
        self.inner.window
    }
}
