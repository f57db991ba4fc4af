#![forbid(unsafe_code)]

//! Cooperative task scheduling.
//!
//! Single-threaded, run-to-completion: a task step is never preempted,
//! and "stopping" means the loop observes a flag after the current step
//! finishes. There is no cancellation primitive.
//!
//! # Queue discipline
//!
//! Tasks wait in a priority queue ordered by:
//!
//! ```text
//! (next_due, priority, submission_seq)
//! ```
//!
//! Earliest due first; lower priority number wins ties; submission
//! order breaks the rest, so equal tasks run FIFO and the built-in
//! input → events → frame ordering holds within a cycle.
//!
//! # Rescheduling
//!
//! A periodic task that started at `t` and ran for `e` ms is next due
//! at `t + max(period, e)`. Basing the next slot on the start time
//! keeps the period honest; the `max` term stops a slow task from
//! piling up catch-up runs after an overrun.
//!
//! # Failure modes
//!
//! | Condition | Behavior | Rationale |
//! |-----------|----------|-----------|
//! | Task step errors | Propagates, loop halts | Crash beats corrupted state |
//! | Clock goes backwards | Treated as elapsed 0 | Saturating arithmetic |
//! | Period 0 | Due every cycle | Input polling wants this |

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::RuntimeError;

/// What a resumable task reports after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work remains; step again when next due.
    Yield,
    /// Finished, with an optional result for the completion callback.
    Complete(Option<i64>),
}

type Callback<C> = Box<dyn FnMut(&mut C) -> Result<(), RuntimeError>>;
type StepFn<C> = Box<dyn FnMut(&mut C) -> Result<Step, RuntimeError>>;
type CompletionFn<C> = Box<dyn FnOnce(&mut C, Option<i64>)>;

enum Work<C> {
    /// Runs to completion every time it is due.
    Callback(Callback<C>),
    /// Stepped once per due slot until it completes.
    Resumable {
        step: StepFn<C>,
        on_complete: Option<CompletionFn<C>>,
    },
}

/// A task waiting to be spawned onto a [`Scheduler`].
pub struct TaskSpec<C> {
    name: String,
    /// Milliseconds between runs; 0 means every cycle.
    period_ms: u64,
    /// Lower runs first among tasks due at the same time.
    priority: u8,
    one_shot: bool,
    work: Work<C>,
}

impl<C> TaskSpec<C> {
    /// A task that runs its callback to completion each time.
    #[must_use]
    pub fn callback(
        name: impl Into<String>,
        f: impl FnMut(&mut C) -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            period_ms: 0,
            priority: 100,
            one_shot: false,
            work: Work::Callback(Box::new(f)),
        }
    }

    /// A resumable task, stepped once per due slot until it reports
    /// [`Step::Complete`].
    #[must_use]
    pub fn resumable(
        name: impl Into<String>,
        step: impl FnMut(&mut C) -> Result<Step, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            period_ms: 0,
            priority: 100,
            one_shot: false,
            work: Work::Resumable {
                step: Box::new(step),
                on_complete: None,
            },
        }
    }

    /// Set the period in milliseconds.
    #[must_use]
    pub fn with_period(mut self, period_ms: u64) -> Self {
        self.period_ms = period_ms;
        self
    }

    /// Set the tie-break priority (lower runs first).
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Run once, then leave the queue.
    #[must_use]
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Attach a completion callback (resumable tasks only; ignored for
    /// plain callbacks).
    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce(&mut C, Option<i64>) + 'static) -> Self {
        if let Work::Resumable { on_complete, .. } = &mut self.work {
            *on_complete = Some(Box::new(f));
        }
        self
    }
}

struct Entry<C> {
    due: u64,
    priority: u8,
    seq: u64,
    task: TaskSpec<C>,
}

impl<C> PartialEq for Entry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C> Eq for Entry<C> {}

impl<C> PartialOrd for Entry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for Entry<C> {
    // BinaryHeap is a max-heap; reverse so the earliest-due entry
    // surfaces first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.priority, other.seq).cmp(&(self.due, self.priority, self.seq))
    }
}

/// A priority/period task queue over a shared context `C`.
pub struct Scheduler<C> {
    heap: BinaryHeap<Entry<C>>,
    seq: u64,
    clock: Box<dyn Fn() -> u64>,
}

impl<C> Scheduler<C> {
    /// Create a scheduler over a monotonic millisecond clock.
    #[must_use]
    pub fn new(clock: impl Fn() -> u64 + 'static) -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
            clock: Box::new(clock),
        }
    }

    /// Queue a task; it is first due immediately.
    pub fn spawn(&mut self, task: TaskSpec<C>) {
        let due = (self.clock)();
        self.spawn_at(task, due);
    }

    /// Queue a task with an explicit first due time.
    pub fn spawn_at(&mut self, task: TaskSpec<C>, due: u64) {
        self.heap.push(Entry {
            due,
            priority: task.priority,
            seq: self.seq,
            task,
        });
        self.seq += 1;
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The earliest due time in the queue, for sleep calculation.
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|e| e.due)
    }

    /// The current clock reading in milliseconds.
    #[must_use]
    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Run every task due at the current clock reading, in queue order.
    ///
    /// Tasks becoming due while the batch runs wait for the next call,
    /// so a zero-period task runs at most once per cycle. Returns how
    /// many task steps ran.
    pub fn run_due(&mut self, ctx: &mut C) -> Result<u32, RuntimeError> {
        let now = (self.clock)();
        let mut batch = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                batch.push(entry);
            }
        }

        let mut ran = 0;
        for mut entry in batch {
            let started = (self.clock)();
            #[cfg(feature = "tracing")]
            tracing::trace!(task = %entry.task.name, due = entry.due, "run");
            let done = match &mut entry.task.work {
                Work::Callback(f) => {
                    f(ctx)?;
                    entry.task.one_shot
                }
                Work::Resumable { step, on_complete } => match step(ctx)? {
                    Step::Yield => false,
                    Step::Complete(result) => {
                        if let Some(f) = on_complete.take() {
                            f(ctx, result);
                        }
                        true
                    }
                },
            };
            ran += 1;
            if !done {
                let elapsed = (self.clock)().saturating_sub(started);
                entry.due = started + entry.task.period_ms.max(elapsed);
                self.heap.push(entry);
            }
        }
        Ok(ran)
    }
}
