//! Deferred tasks on a dedicated worker thread.
//!
//! Scripted replies are delayed to imitate a real Unity client. The delays
//! run here rather than on the receive thread so inbound records keep
//! flowing while replies are pending.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::SCHEDULE_TARGET;
use crate::errors::ScheduleError;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Pending),
    Shutdown,
}

struct Pending {
    deadline: Instant,
    sequence: u64,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    task: Task,
}

// Min-heap on (deadline, sequence): earlier deadlines first, ties in
// submission order.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for Pending {}

/// Cancellation handle for a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Prevents the task from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the task has run to completion or panicked.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Runs tasks after a delay on one background thread.
///
/// Dropping the scheduler stops the worker; tasks that have not fired are
/// discarded.
#[derive(Debug)]
pub struct Scheduler {
    commands: mpsc::Sender<Command>,
    sequence: AtomicU64,
    worker: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Spawn`] if the thread cannot be created.
    pub fn start() -> Result<Self, ScheduleError> {
        let (commands, inbox) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(String::from("spray-scheduler"))
            .spawn(move || run_worker(&inbox))
            .map_err(|source| ScheduleError::Spawn { source })?;
        Ok(Self {
            commands,
            sequence: AtomicU64::new(0),
            worker: Some(worker),
        })
    }

    /// Runs `task` once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Stopped`] if the worker has exited.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let pending = Pending {
            deadline: Instant::now() + delay,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::clone(&cancelled),
            finished: Arc::clone(&finished),
            task: Box::new(task),
        };
        self.commands
            .send(Command::Run(pending))
            .map_err(|_| ScheduleError::Stopped)?;
        Ok(TaskHandle {
            cancelled,
            finished,
        })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!(target: SCHEDULE_TARGET, "scheduler worker panicked");
        }
    }
}

fn run_worker(inbox: &mpsc::Receiver<Command>) {
    let mut queue = BinaryHeap::<Pending>::new();
    loop {
        let received = match queue.peek() {
            Some(next) => inbox.recv_timeout(next.deadline.saturating_duration_since(Instant::now())),
            None => inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Command::Run(pending)) => queue.push(pending),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        run_due(&mut queue);
    }
    if !queue.is_empty() {
        debug!(
            target: SCHEDULE_TARGET,
            discarded = queue.len(),
            "scheduler stopped with pending tasks"
        );
    }
}

fn run_due(queue: &mut BinaryHeap<Pending>) {
    let now = Instant::now();
    while queue.peek().is_some_and(|next| next.deadline <= now) {
        let Some(pending) = queue.pop() else {
            break;
        };
        if pending.cancelled.load(Ordering::SeqCst) {
            continue;
        }
        if panic::catch_unwind(AssertUnwindSafe(pending.task)).is_err() {
            warn!(target: SCHEDULE_TARGET, "scheduled task panicked");
        }
        pending.finished.store(true, Ordering::SeqCst);
    }
}
