//! Task Scheduler
//!
//! The scheduler is the host event loop abstraction that the rest of the
//! crate talks to. It owns two queues:
//!
//! - **tasks**: deferred signal listeners. Every notification is queued as its
//!   own task, so deferred callbacks never run inside the `set` that caused
//!   them.
//! - **frames**: animation-frame callbacks. All DOM writes triggered by signal
//!   updates are queued here so that writes are batched into one write phase.
//!
//! A browser host would drain the queues from `setTimeout` and
//! `requestAnimationFrame`; tests and servers drain them explicitly.
//!
//! # Thread Model
//!
//! Each thread has a default scheduler, returned by [`Scheduler::current`].
//! Signals capture the scheduler that is current when they are created.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::SchedulerConfig;

/// A unit of queued work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

#[derive(Default)]
struct Queues {
    tasks: VecDeque<Task>,
    frames: VecDeque<Task>,
}

/// Handle to a pair of task/frame queues. Clones share the same queues.
#[derive(Clone)]
pub struct Scheduler {
    queues: Arc<Mutex<Queues>>,
    max_turns: usize,
}

impl Scheduler {
    /// Create a scheduler with default limits.
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default())
    }

    /// Create a scheduler with the given limits.
    pub fn with_config(config: &SchedulerConfig) -> Self {
        Self {
            queues: Arc::new(Mutex::new(Queues::default())),
            max_turns: config.max_turns,
        }
    }

    /// The scheduler of the calling thread, created on first use.
    pub fn current() -> Self {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(Scheduler::new)
                .clone()
        })
    }

    /// Make `scheduler` the current scheduler of the calling thread.
    ///
    /// Returns the previously installed scheduler, if any.
    pub fn install(scheduler: Scheduler) -> Option<Scheduler> {
        CURRENT.with(|current| current.borrow_mut().replace(scheduler))
    }

    /// Queue a deferred task.
    pub fn queue_task(&self, task: impl FnOnce() + Send + 'static) {
        self.queues.lock().tasks.push_back(Box::new(task));
    }

    /// Queue a callback for the next animation frame (the DOM write phase).
    pub fn request_animation_frame(&self, callback: impl FnOnce() + Send + 'static) {
        self.queues.lock().frames.push_back(Box::new(callback));
    }

    /// Number of tasks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.queues.lock().tasks.len()
    }

    /// Number of frame callbacks waiting to run.
    pub fn pending_frames(&self) -> usize {
        self.queues.lock().frames.len()
    }

    /// Whether both queues are empty.
    pub fn is_idle(&self) -> bool {
        let queues = self.queues.lock();
        queues.tasks.is_empty() && queues.frames.is_empty()
    }

    /// Run tasks until the task queue is empty, including tasks queued by the
    /// tasks themselves. Returns how many ran.
    pub fn run_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // The lock must be released before the task runs: tasks queue more work.
            let next = self.queues.lock().tasks.pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            trace!(ran, "drained task queue");
        }
        ran
    }

    /// Run one animation frame: every callback queued before the frame
    /// started. Callbacks requested during the frame wait for the next one.
    pub fn run_frame(&self) -> usize {
        let frame: Vec<Task> = self.queues.lock().frames.drain(..).collect();
        let ran = frame.len();
        for callback in frame {
            callback();
        }
        if ran > 0 {
            trace!(ran, "ran animation frame");
        }
        ran
    }

    /// Alternate task draining and frames until both queues are empty.
    ///
    /// Stops after the configured number of turns if work keeps arriving, so
    /// a feedback loop between signals cannot hang the host. Returns the
    /// total number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..self.max_turns {
            if self.is_idle() {
                return total;
            }
            total += self.run_tasks();
            total += self.run_frame();
        }
        if !self.is_idle() {
            warn!(
                max_turns = self.max_turns,
                "scheduler still busy after max turns; leaving remaining work queued"
            );
        }
        total
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_frames", &self.pending_frames())
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tasks_run_in_queue_order() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            scheduler.queue_task(move || log.lock().push(i));
        }
        assert_eq!(scheduler.pending_tasks(), 3);

        assert_eq!(scheduler.run_tasks(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_queued_by_tasks_run_in_same_drain() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_count = count.clone();
        scheduler.queue_task(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let again = inner_count.clone();
            inner_scheduler.queue_task(move || {
                again.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(scheduler.run_tasks(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn frame_requested_during_frame_waits_for_next_frame() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_count = count.clone();
        scheduler.request_animation_frame(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let again = inner_count.clone();
            inner_scheduler.request_animation_frame(move || {
                again.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_frames(), 1);
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn run_until_idle_is_bounded() {
        fn requeue(scheduler: Scheduler) {
            let next = scheduler.clone();
            scheduler.request_animation_frame(move || requeue(next));
        }

        let scheduler = Scheduler::with_config(&SchedulerConfig { max_turns: 5 });
        requeue(scheduler.clone());

        assert_eq!(scheduler.run_until_idle(), 5);
        assert_eq!(scheduler.pending_frames(), 1);
    }

    #[test]
    fn current_is_shared_within_a_thread() {
        let a = Scheduler::current();
        let b = Scheduler::current();
        a.queue_task(|| {});
        assert_eq!(b.pending_tasks(), 1);
        b.run_tasks();
    }
}
